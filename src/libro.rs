//! Lectura y escritura de libros de Excel.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use rust_xlsxwriter::{Format, FormatAlign, Workbook, Worksheet};

use crate::error::{Error, Resultado};

/// Primera hoja de un libro: encabezados de la fila 1 y filas de datos.
#[derive(Debug, Clone)]
pub struct HojaLeida {
    pub encabezados: Vec<String>,
    pub filas: Vec<Vec<Data>>,
}

impl HojaLeida {
    /// Índice de la primera columna cuyo encabezado contiene `patron`
    /// (sin distinguir mayúsculas).
    pub fn columna(&self, patron: &str) -> Option<usize> {
        let patron = patron.to_lowercase();
        self.encabezados
            .iter()
            .position(|e| e.to_lowercase().contains(&patron))
    }
}

/// Lee la primera hoja de `ruta` (xlsx, xls u ods).
pub fn leer_primera_hoja(ruta: &Path) -> Resultado<HojaLeida> {
    let mut workbook = open_workbook_auto(ruta)?;
    let range = match workbook.worksheet_range_at(0) {
        Some(r) => r?,
        None => return Err(Error::LibroVacio(ruta.to_path_buf())),
    };

    let mut filas = range.rows();
    let encabezados = match filas.next() {
        Some(fila) => fila.iter().map(|c| texto_celda(c).trim().to_string()).collect(),
        None => Vec::new(),
    };
    let filas = filas
        .filter(|fila| fila.iter().any(|c| !celda_vacia(c)))
        .map(|fila| fila.to_vec())
        .collect();

    Ok(HojaLeida { encabezados, filas })
}

/// Texto de una celda; los números enteros guardados como flotante no
/// arrastran el `.0`.
pub fn texto_celda(celda: &Data) -> String {
    match celda {
        Data::Empty => String::new(),
        Data::Float(f) if f.fract() == 0.0 && f.abs() < 1e15 => format!("{}", *f as i64),
        otro => otro.to_string(),
    }
}

pub fn celda_vacia(celda: &Data) -> bool {
    match celda {
        Data::Empty => true,
        Data::String(s) => s.trim().is_empty(),
        _ => false,
    }
}

/// Valor de una celda de salida.
#[derive(Debug, Clone, PartialEq)]
pub enum Celda {
    Texto(String),
    Numero(f64),
    Vacia,
}

impl Celda {
    pub fn texto(s: impl Into<String>) -> Self {
        Celda::Texto(s.into())
    }

    /// Convierte una celda leída conservando los números como números.
    pub fn desde_leida(celda: &Data) -> Self {
        match celda {
            Data::Empty => Celda::Vacia,
            Data::Int(i) => Celda::Numero(*i as f64),
            Data::Float(f) => Celda::Numero(*f),
            otro => Celda::Texto(texto_celda(otro)),
        }
    }
}

impl From<u64> for Celda {
    fn from(n: u64) -> Self {
        Celda::Numero(n as f64)
    }
}

impl From<&str> for Celda {
    fn from(s: &str) -> Self {
        Celda::Texto(s.to_string())
    }
}

impl From<String> for Celda {
    fn from(s: String) -> Self {
        Celda::Texto(s)
    }
}

/// Una fila de salida con columnas fijas.
pub trait FilaPlantilla {
    fn encabezados() -> &'static [&'static str];
    fn celdas(&self) -> Vec<Celda>;
}

pub fn escribir_celda(hoja: &mut Worksheet, fila: u32, col: u16, celda: &Celda) -> Resultado<()> {
    match celda {
        Celda::Texto(s) => {
            hoja.write_string(fila, col, s)?;
        }
        Celda::Numero(n) => {
            hoja.write_number(fila, col, *n)?;
        }
        Celda::Vacia => {}
    }
    Ok(())
}

pub fn escribir_celda_con_formato(
    hoja: &mut Worksheet,
    fila: u32,
    col: u16,
    celda: &Celda,
    formato: &Format,
) -> Resultado<()> {
    match celda {
        Celda::Texto(s) => {
            hoja.write_string_with_format(fila, col, s, formato)?;
        }
        Celda::Numero(n) => {
            hoja.write_number_with_format(fila, col, *n, formato)?;
        }
        Celda::Vacia => {}
    }
    Ok(())
}

/// Agrega una hoja con encabezados y una fila por registro.
pub fn agregar_hoja<F: FilaPlantilla>(libro: &mut Workbook, nombre: &str, registros: &[F]) -> Resultado<()> {
    let filas: Vec<Vec<Celda>> = registros.iter().map(FilaPlantilla::celdas).collect();
    agregar_hoja_celdas(libro, nombre, F::encabezados(), &filas)
}

/// Agrega una hoja a partir de celdas ya armadas.
pub fn agregar_hoja_celdas(
    libro: &mut Workbook,
    nombre: &str,
    encabezados: &[&str],
    filas: &[Vec<Celda>],
) -> Resultado<()> {
    let hoja = libro.add_worksheet();
    hoja.set_name(nombre)?;

    let negrita = Format::new().set_bold();
    for (col, encabezado) in encabezados.iter().enumerate() {
        hoja.write_string_with_format(0, col as u16, *encabezado, &negrita)?;
    }

    for (i, fila) in filas.iter().enumerate() {
        let row = (i + 1) as u32;
        for (col, celda) in fila.iter().enumerate() {
            escribir_celda(hoja, row, col as u16, celda)?;
        }
    }

    for (col, encabezado) in encabezados.iter().enumerate() {
        let ancho = encabezado.chars().count().clamp(8, 40) as f64 + 2.0;
        hoja.set_column_width(col as u16, ancho)?;
    }
    Ok(())
}

/// Formato de alineación izquierda para las plantillas de cargue.
pub fn formato_izquierda() -> Format {
    Format::new().set_align(FormatAlign::Left)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn texto_celda_sin_decimales_para_enteros() {
        assert_eq!(texto_celda(&Data::Float(123.0)), "123");
        assert_eq!(texto_celda(&Data::Float(0.5)), "0.5");
        assert_eq!(texto_celda(&Data::Int(7)), "7");
        assert_eq!(texto_celda(&Data::String("A1".into())), "A1");
        assert_eq!(texto_celda(&Data::Empty), "");
    }

    #[test]
    fn busca_columna_sin_distinguir_mayusculas() {
        let hoja = HojaLeida {
            encabezados: vec!["No CDP".into(), "No. Interno".into(), "OBJETO".into()],
            filas: Vec::new(),
        };
        assert_eq!(hoja.columna("cdp"), Some(0));
        assert_eq!(hoja.columna("interno"), Some(1));
        assert_eq!(hoja.columna("objeto"), Some(2));
        assert_eq!(hoja.columna("valor"), None);
    }

    #[test]
    fn celda_desde_leida_conserva_numeros() {
        assert_eq!(Celda::desde_leida(&Data::Float(2.5)), Celda::Numero(2.5));
        assert_eq!(Celda::desde_leida(&Data::Empty), Celda::Vacia);
        assert_eq!(Celda::desde_leida(&Data::String("x".into())), Celda::texto("x"));
    }
}
