//! Fixtures compartidos: PDF mínimos armados con lopdf y libros de Excel.

#![allow(dead_code)]

use std::path::Path;

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use rust_xlsxwriter::Workbook;

/// PDF de una página con cada texto en `(x, y)`; un bloque BT/ET por texto.
pub fn pdf_con_textos(textos: &[(i64, i64, &str)]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut operations = Vec::new();
    for (x, y, texto) in textos {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 9.into()]));
        operations.push(Operation::new("Td", vec![(*x).into(), (*y).into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(*texto)]));
        operations.push(Operation::new("ET", vec![]));
    }
    let content = Content { operations };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources_id,
    });
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => vec![page_id.into()],
        "Count" => 1,
        "MediaBox" => vec![0.into(), 0.into(), 842.into(), 595.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// PDF con una línea de texto por renglón, de arriba hacia abajo.
pub fn pdf_con_lineas(lineas: &[&str]) -> Vec<u8> {
    let textos: Vec<(i64, i64, &str)> = lineas
        .iter()
        .enumerate()
        .map(|(i, l)| (50, 560 - 14 * i as i64, *l))
        .collect();
    pdf_con_textos(&textos)
}

/// PDF con una tabla: cada fila a su altura, cada celda en su columna.
pub fn pdf_con_tabla(titulo: &str, filas: &[&[&str]]) -> Vec<u8> {
    let mut textos = vec![(20, 570, titulo)];
    for (i, fila) in filas.iter().enumerate() {
        let y = 540 - 20 * i as i64;
        for (j, celda) in fila.iter().enumerate() {
            textos.push((20 + 80 * j as i64, y, *celda));
        }
    }
    pdf_con_textos(&textos)
}

pub fn escribir(ruta: &Path, bytes: &[u8]) {
    std::fs::write(ruta, bytes).unwrap();
}

/// Libro con encabezados y filas de texto; las celdas numéricas se escriben
/// como número.
pub fn libro(ruta: &Path, encabezados: &[&str], filas: &[&[&str]]) {
    let mut libro = Workbook::new();
    let hoja = libro.add_worksheet();
    for (col, e) in encabezados.iter().enumerate() {
        hoja.write_string(0, col as u16, *e).unwrap();
    }
    for (i, fila) in filas.iter().enumerate() {
        for (col, valor) in fila.iter().enumerate() {
            let row = (i + 1) as u32;
            match valor.parse::<f64>() {
                Ok(n) => hoja.write_number(row, col as u16, n).unwrap(),
                Err(_) => hoja.write_string(row, col as u16, *valor).unwrap(),
            };
        }
    }
    libro.save(ruta).unwrap();
}
