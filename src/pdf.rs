//! Extracción de texto y tablas de los PDF de contratos.
//!
//! El texto sale de `lopdf::Document::extract_text` página por página. Las
//! tablas se reconstruyen recorriendo los operadores de texto del contenido
//! de cada página: los fragmentos se agrupan en filas por su coordenada Y y
//! en columnas por los inicios X comunes dentro de un bloque de filas.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::Resultado;

/// Diferencia máxima en Y para considerar dos fragmentos en la misma fila.
const TOLERANCIA_FILA: f32 = 2.0;

/// Separación mínima en X entre inicios de columna.
const TOLERANCIA_COLUMNA: f32 = 4.0;

static SEPARADOR_CELDAS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\t|\s{2,}|\s*\|\s*").unwrap());

/// Abre un PDF desde memoria.
pub fn cargar(bytes: &[u8]) -> Resultado<Document> {
    Ok(Document::load_mem(bytes)?)
}

/// Texto de cada página en orden. Las páginas ilegibles se omiten.
pub fn texto_paginas(doc: &Document) -> Vec<String> {
    let mut paginas = Vec::new();
    for page_num in doc.get_pages().keys() {
        match doc.extract_text(&[*page_num]) {
            Ok(texto) => paginas.push(texto),
            Err(e) => warn!("Error extrayendo texto de página {}: {}", page_num, e),
        }
    }
    paginas
}

/// Todas las líneas no vacías del documento, sin espacios al final.
pub fn lineas(doc: &Document) -> Vec<String> {
    texto_paginas(doc)
        .iter()
        .flat_map(|t| t.lines())
        .map(str::trim_end)
        .filter(|l| !l.trim().is_empty())
        .map(str::to_string)
        .collect()
}

/// Filas de todas las tablas detectadas, página por página.
///
/// Cuando una página no tiene fragmentos posicionados alineados (fuentes
/// compuestas, contenido en XObjects) se recurre a partir las líneas del
/// texto en tabuladores, barras o dos o más espacios.
pub fn filas_tablas(doc: &Document) -> Vec<Vec<String>> {
    let mut filas = Vec::new();
    for (page_num, page_id) in doc.get_pages() {
        let tablas = match fragmentos_pagina(doc, page_id) {
            Ok(fragmentos) => tablas(agrupar_filas(fragmentos)),
            Err(e) => {
                warn!("No se pudo leer el contenido de la página {}: {}", page_num, e);
                Vec::new()
            }
        };

        if tablas.is_empty() {
            let texto = doc.extract_text(&[page_num]).unwrap_or_default();
            let respaldo = filas_desde_texto(&texto);
            debug!("Página {}: {} filas por texto plano", page_num, respaldo.len());
            filas.extend(respaldo);
        } else {
            debug!("Página {}: {} tablas posicionadas", page_num, tablas.len());
            filas.extend(tablas.into_iter().flatten());
        }
    }
    filas
}

/// Parte líneas de texto en celdas. Las líneas con una sola celda se descartan.
pub fn filas_desde_texto(texto: &str) -> Vec<Vec<String>> {
    texto
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| {
            SEPARADOR_CELDAS
                .split(l.trim())
                .map(|c| c.trim().to_string())
                .collect::<Vec<_>>()
        })
        .filter(|celdas| celdas.len() > 1)
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
struct Fragmento {
    x: f32,
    y: f32,
    texto: String,
}

#[derive(Debug, Clone, Copy)]
struct Matriz([f32; 6]);

impl Matriz {
    const IDENTIDAD: Matriz = Matriz([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn trasladar(self, tx: f32, ty: f32) -> Matriz {
        let [a, b, c, d, e, f] = self.0;
        Matriz([a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f])
    }

    fn origen(self) -> (f32, f32) {
        (self.0[4], self.0[5])
    }
}

fn fragmentos_pagina(doc: &Document, page_id: ObjectId) -> Resultado<Vec<Fragmento>> {
    let bytes = doc.get_page_content(page_id)?;
    let contenido = Content::decode(&bytes)?;

    let mut fragmentos = Vec::new();
    let mut linea = Matriz::IDENTIDAD;
    let mut interlineado = 0.0_f32;

    let mut empujar = |m: Matriz, texto: String| {
        if !texto.trim().is_empty() {
            let (x, y) = m.origen();
            fragmentos.push(Fragmento { x, y, texto });
        }
    };

    for op in &contenido.operations {
        let o = &op.operands;
        match op.operator.as_str() {
            "BT" => linea = Matriz::IDENTIDAD,
            "Tm" if o.len() == 6 => {
                let mut m = [0.0; 6];
                for (i, v) in o.iter().enumerate() {
                    m[i] = numero(Some(v));
                }
                linea = Matriz(m);
            }
            "Td" => linea = linea.trasladar(numero(o.first()), numero(o.get(1))),
            "TD" => {
                interlineado = -numero(o.get(1));
                linea = linea.trasladar(numero(o.first()), numero(o.get(1)));
            }
            "TL" => interlineado = numero(o.first()),
            "T*" => linea = linea.trasladar(0.0, -interlineado),
            "Tj" => empujar(linea, cadena(o.first())),
            "TJ" => empujar(linea, cadena(o.first())),
            "'" => {
                linea = linea.trasladar(0.0, -interlineado);
                empujar(linea, cadena(o.first()));
            }
            "\"" => {
                linea = linea.trasladar(0.0, -interlineado);
                empujar(linea, cadena(o.get(2)));
            }
            _ => {}
        }
    }

    Ok(fragmentos)
}

fn numero(obj: Option<&Object>) -> f32 {
    match obj {
        Some(Object::Integer(i)) => *i as f32,
        Some(Object::Real(r)) => *r as f32,
        _ => 0.0,
    }
}

/// Texto de un operando `Tj`/`TJ`. Los desplazamientos grandes de `TJ` se
/// interpretan como espacio entre palabras.
fn cadena(obj: Option<&Object>) -> String {
    match obj {
        Some(Object::String(bytes, _)) => decodificar(bytes),
        Some(Object::Array(partes)) => {
            let mut texto = String::new();
            for parte in partes {
                match parte {
                    Object::String(bytes, _) => texto.push_str(&decodificar(bytes)),
                    otro => {
                        if numero(Some(otro)) < -200.0 {
                            texto.push(' ');
                        }
                    }
                }
            }
            texto
        }
        _ => String::new(),
    }
}

/// UTF-16BE con BOM o, en su defecto, un byte por carácter (Latin-1).
fn decodificar(bytes: &[u8]) -> String {
    if let Some(resto) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let unidades: Vec<u16> = resto
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        String::from_utf16_lossy(&unidades)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn comparar(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Agrupa de arriba hacia abajo; dentro de cada fila, de izquierda a derecha.
fn agrupar_filas(mut fragmentos: Vec<Fragmento>) -> Vec<Vec<Fragmento>> {
    fragmentos.sort_by(|a, b| comparar(b.y, a.y).then(comparar(a.x, b.x)));

    let mut filas: Vec<Vec<Fragmento>> = Vec::new();
    for fragmento in fragmentos {
        match filas.last_mut() {
            Some(fila) if (fila[0].y - fragmento.y).abs() <= TOLERANCIA_FILA => fila.push(fragmento),
            _ => filas.push(vec![fragmento]),
        }
    }
    for fila in &mut filas {
        fila.sort_by(|a, b| comparar(a.x, b.x));
    }
    filas
}

/// Un bloque de filas consecutivas con dos o más fragmentos es candidato a
/// tabla. Los títulos y párrafos pegados al bloque no calzan con sus columnas
/// y quedan fuera.
fn tablas(filas: Vec<Vec<Fragmento>>) -> Vec<Vec<Vec<String>>> {
    let mut bloques = Vec::new();
    let mut actual = Vec::new();
    for fila in filas {
        if fila.len() >= 2 {
            actual.push(fila);
        } else if !actual.is_empty() {
            bloques.push(std::mem::take(&mut actual));
        }
    }
    if !actual.is_empty() {
        bloques.push(actual);
    }

    bloques
        .into_iter()
        .map(filas_alineadas)
        .filter(|bloque| !bloque.is_empty())
        .map(celdas)
        .collect()
}

/// Cantidad de fragmentos más frecuente en el bloque; en empate, la mayor.
fn fragmentos_dominantes(bloque: &[Vec<Fragmento>]) -> usize {
    let mut conteo: BTreeMap<usize, usize> = BTreeMap::new();
    for fila in bloque {
        *conteo.entry(fila.len()).or_default() += 1;
    }
    conteo
        .into_iter()
        .max_by_key(|&(fragmentos, veces)| (veces, fragmentos))
        .map_or(0, |(fragmentos, _)| fragmentos)
}

/// Filas cuyos fragmentos caen en su mayoría sobre las columnas que comparten
/// las filas dominantes del bloque.
fn filas_alineadas(bloque: Vec<Vec<Fragmento>>) -> Vec<Vec<Fragmento>> {
    let dominante = fragmentos_dominantes(&bloque);
    let dominantes: Vec<&Vec<Fragmento>> = bloque.iter().filter(|fila| fila.len() == dominante).collect();
    let columnas: Vec<f32> = anclas(&dominantes)
        .into_iter()
        .filter(|(_, soporte)| soporte * 2 > dominantes.len())
        .map(|(x, _)| x)
        .collect();

    let (alineadas, sueltas): (Vec<_>, Vec<_>) = bloque
        .into_iter()
        .partition(|fila| alineada(fila, &columnas));
    for fila in &sueltas {
        let texto: Vec<&str> = fila.iter().map(|f| f.texto.trim()).collect();
        debug!("Fila fuera de la tabla: {}", texto.join(" "));
    }
    alineadas
}

fn alineada(fila: &[Fragmento], columnas: &[f32]) -> bool {
    let calzan = fila
        .iter()
        .filter(|f| columnas.iter().any(|c| (f.x - c).abs() <= TOLERANCIA_COLUMNA))
        .count();
    calzan * 2 > fila.len()
}

/// Inicios de columna con la cantidad de filas que tienen un fragmento en
/// cada uno. Los X a menos de `TOLERANCIA_COLUMNA` del anterior se fusionan.
fn anclas(filas: &[&Vec<Fragmento>]) -> Vec<(f32, usize)> {
    let mut xs: Vec<(f32, usize)> = filas
        .iter()
        .enumerate()
        .flat_map(|(i, fila)| fila.iter().map(move |f| (f.x, i)))
        .collect();
    xs.sort_by(|a, b| comparar(a.0, b.0));

    let mut grupos: Vec<(f32, BTreeSet<usize>)> = Vec::new();
    let mut previo: Option<f32> = None;
    for (x, fila) in xs {
        match grupos.last_mut() {
            Some((_, soporte)) if previo.map_or(false, |p| x - p <= TOLERANCIA_COLUMNA) => {
                soporte.insert(fila);
            }
            _ => grupos.push((x, BTreeSet::from([fila]))),
        }
        previo = Some(x);
    }
    grupos.into_iter().map(|(x, soporte)| (x, soporte.len())).collect()
}

/// Asigna cada fragmento a la columna cuyo inicio es el último a su izquierda.
/// Las columnas sin fragmento en una fila quedan como celdas vacías.
fn celdas(filas: Vec<Vec<Fragmento>>) -> Vec<Vec<String>> {
    let anclas: Vec<f32> = anclas(&filas.iter().collect::<Vec<_>>())
        .into_iter()
        .map(|(x, _)| x)
        .collect();

    filas
        .into_iter()
        .map(|fila| {
            let mut celdas = vec![String::new(); anclas.len()];
            for fragmento in fila {
                let i = anclas.iter().rposition(|a| *a <= fragmento.x).unwrap_or(0);
                let texto = fragmento.texto.trim();
                if !celdas[i].is_empty() {
                    celdas[i].push(' ');
                }
                celdas[i].push_str(texto);
            }
            celdas
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(x: f32, y: f32, texto: &str) -> Fragmento {
        Fragmento { x, y, texto: texto.to_string() }
    }

    #[test]
    fn agrupa_por_altura_y_ordena_por_x() {
        let filas = agrupar_filas(vec![
            frag(200.0, 700.0, "b"),
            frag(50.0, 650.0, "c"),
            frag(50.0, 700.5, "a"),
        ]);
        assert_eq!(filas.len(), 2);
        assert_eq!(filas[0].iter().map(|f| f.texto.as_str()).collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(filas[1][0].texto, "c");
    }

    #[test]
    fn celdas_vacias_por_columna_sin_fragmento() {
        let bloque = vec![
            vec![frag(10.0, 700.0, "No"), frag(100.0, 700.0, "Beneficiario"), frag(200.0, 700.0, "CDP"), frag(300.0, 700.0, "Valor")],
            vec![frag(10.0, 680.0, "C-1"), frag(201.0, 680.0, "123"), frag(300.0, 680.0, "$1.000.000")],
        ];
        let filas = celdas(bloque);
        assert_eq!(filas[0], ["No", "Beneficiario", "CDP", "Valor"]);
        assert_eq!(filas[1], ["C-1", "", "123", "$1.000.000"]);
    }

    #[test]
    fn filas_sueltas_separan_tablas() {
        let filas = vec![
            vec![frag(10.0, 700.0, "a"), frag(100.0, 700.0, "b")],
            vec![frag(10.0, 680.0, "Título suelto")],
            vec![frag(10.0, 660.0, "c"), frag(50.0, 660.0, "d"), frag(90.0, 660.0, "e")],
        ];
        let t = tablas(filas);
        assert_eq!(t.len(), 2);
        assert_eq!(t[0][0], ["a", "b"]);
        assert_eq!(t[1][0], ["c", "d", "e"]);
    }

    #[test]
    fn titulo_sobre_la_tabla_no_desplaza_columnas() {
        let mut contrato = vec![frag(20.0, 560.0, "RELACION"), frag(60.0, 560.0, "DE COMPROMISOS")];
        let valores = ["C-1", "2026", "CPS", "01", "BEN", "x", "y", "123", "z", "$1.000.000"];
        contrato.extend(
            valores
                .iter()
                .enumerate()
                .map(|(j, v)| frag(20.0 + 80.0 * j as f32, 540.0, v)),
        );

        let t = tablas(agrupar_filas(contrato));
        assert_eq!(t.len(), 1);
        assert_eq!(t[0], vec![valores.iter().map(|v| v.to_string()).collect::<Vec<_>>()]);
    }

    #[test]
    fn parrafo_entre_filas_queda_fuera() {
        let filas = vec![
            vec![frag(10.0, 700.0, "No"), frag(100.0, 700.0, "CDP"), frag(200.0, 700.0, "Valor")],
            vec![frag(10.0, 690.0, "C-1"), frag(100.0, 690.0, "123"), frag(200.0, 690.0, "$5")],
            vec![frag(35.0, 680.0, "Nota:"), frag(140.0, 680.0, "ver anexo"), frag(260.0, 680.0, "del contrato")],
            vec![frag(10.0, 670.0, "C-2"), frag(201.0, 670.0, "$7")],
        ];
        let t = tablas(filas);
        assert_eq!(t.len(), 1);
        assert_eq!(t[0], vec![
            vec!["No".to_string(), "CDP".to_string(), "Valor".to_string()],
            vec!["C-1".to_string(), "123".to_string(), "$5".to_string()],
            vec!["C-2".to_string(), String::new(), "$7".to_string()],
        ]);
    }

    #[test]
    fn empate_prefiere_la_fila_mas_ancha() {
        let bloque = vec![
            vec![frag(10.0, 700.0, "a"), frag(50.0, 700.0, "b")],
            vec![frag(10.0, 690.0, "c"), frag(50.0, 690.0, "d"), frag(90.0, 690.0, "e")],
        ];
        assert_eq!(fragmentos_dominantes(&bloque), 3);
    }

    #[test]
    fn decodifica_utf16_y_latin1() {
        assert_eq!(decodificar(&[0xFE, 0xFF, 0x00, 0x4E, 0x00, 0xBA]), "Nº");
        assert_eq!(decodificar(b"A\xF1o"), "Año");
    }

    #[test]
    fn cadena_tj_inserta_espacios_en_desplazamientos_grandes() {
        let arreglo = Object::Array(vec![
            Object::string_literal("SERVICIOS"),
            Object::Integer(-250),
            Object::string_literal("PROFESIONALES"),
            Object::Integer(-20),
            Object::string_literal("."),
        ]);
        assert_eq!(cadena(Some(&arreglo)), "SERVICIOS PROFESIONALES.");
    }

    #[test]
    fn respaldo_por_texto_respeta_separadores() {
        let filas = filas_desde_texto("C-1\t\tBEN\n\nsolo una celda\nA | B | C\nX    Y");
        assert_eq!(filas, vec![
            vec!["C-1".to_string(), String::new(), "BEN".to_string()],
            vec!["A".to_string(), "B".to_string(), "C".to_string()],
            vec!["X".to_string(), "Y".to_string()],
        ]);
    }
}
