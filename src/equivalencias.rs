//! Tabla de equivalencias CDP → número interno y objeto.

use std::collections::HashMap;
use std::path::Path;

use tracing::info;

use crate::error::{Error, Resultado};
use crate::libro::{leer_primera_hoja, texto_celda, HojaLeida};

/// Marcador para los datos de un CDP ausente de la tabla.
pub const NO_ENCONTRADO: &str = "NO ENCONTRADO";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatosCdp {
    pub no_interno: String,
    pub objeto: String,
}

impl DatosCdp {
    pub fn new(no_interno: impl Into<String>, objeto: impl Into<String>) -> Self {
        Self {
            no_interno: no_interno.into(),
            objeto: objeto.into(),
        }
    }
}

/// Se carga una vez por lote y no cambia durante el procesamiento.
#[derive(Debug, Clone, Default)]
pub struct TablaEquivalencias {
    mapa: HashMap<String, DatosCdp>,
}

impl TablaEquivalencias {
    /// Lee la primera hoja del libro. Las columnas se buscan por nombre:
    /// la primera que contenga `cdp`, `interno` y `objeto`.
    pub fn cargar(ruta: &Path) -> Resultado<Self> {
        let hoja = leer_primera_hoja(ruta)?;
        let tabla = Self::desde_hoja(&hoja, ruta)?;
        info!("Equivalencias cargadas: {} CDP desde {}", tabla.len(), ruta.display());
        Ok(tabla)
    }

    pub fn desde_hoja(hoja: &HojaLeida, ruta: &Path) -> Resultado<Self> {
        let col_cdp = hoja.columna("cdp");
        let col_interno = hoja.columna("interno");
        let col_objeto = hoja.columna("objeto");

        let (col_cdp, col_interno, col_objeto) = match (col_cdp, col_interno, col_objeto) {
            (Some(c), Some(i), Some(o)) => (c, i, o),
            _ => {
                let faltantes = [("CDP", col_cdp), ("Interno", col_interno), ("Objeto", col_objeto)]
                    .iter()
                    .filter(|(_, col)| col.is_none())
                    .map(|(nombre, _)| nombre.to_string())
                    .collect();
                return Err(Error::ColumnasFaltantes {
                    archivo: ruta.to_path_buf(),
                    faltantes,
                });
            }
        };

        let celda = |fila: &[calamine::Data], col: usize| {
            fila.get(col).map(texto_celda).unwrap_or_default().trim().to_string()
        };

        let mut tabla = Self::default();
        for fila in &hoja.filas {
            tabla.insertar(
                celda(fila, col_cdp),
                DatosCdp::new(celda(fila, col_interno), celda(fila, col_objeto)),
            );
        }
        Ok(tabla)
    }

    /// Una clave repetida reemplaza a la anterior.
    pub fn insertar(&mut self, cdp: impl Into<String>, datos: DatosCdp) {
        self.mapa.insert(cdp.into(), datos);
    }

    pub fn buscar(&self, cdp: &str) -> Option<&DatosCdp> {
        self.mapa.get(cdp.trim())
    }

    pub fn len(&self) -> usize {
        self.mapa.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapa.is_empty()
    }
}

impl<K: Into<String>> FromIterator<(K, DatosCdp)> for TablaEquivalencias {
    fn from_iter<I: IntoIterator<Item = (K, DatosCdp)>>(iter: I) -> Self {
        let mut tabla = Self::default();
        for (cdp, datos) in iter {
            tabla.insertar(cdp, datos);
        }
        tabla
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::Data;

    fn hoja(encabezados: &[&str], filas: Vec<Vec<Data>>) -> HojaLeida {
        HojaLeida {
            encabezados: encabezados.iter().map(|e| e.to_string()).collect(),
            filas,
        }
    }

    #[test]
    fn carga_columnas_por_nombre() {
        let h = hoja(
            &["Objeto contractual", "Número CDP", "No Interno"],
            vec![
                vec![Data::String("Servicios Profesionales".into()), Data::Float(123.0), Data::String("A1".into())],
                vec![Data::String("Apoyo".into()), Data::String(" 456 ".into()), Data::Int(77)],
            ],
        );
        let tabla = TablaEquivalencias::desde_hoja(&h, Path::new("eq.xlsx")).unwrap();
        assert_eq!(tabla.len(), 2);
        assert_eq!(tabla.buscar("123"), Some(&DatosCdp::new("A1", "Servicios Profesionales")));
        assert_eq!(tabla.buscar("456").map(|d| d.no_interno.as_str()), Some("77"));
        assert!(tabla.buscar("999").is_none());
    }

    #[test]
    fn columnas_faltantes_abortan() {
        let h = hoja(&["CDP", "Descripción"], Vec::new());
        match TablaEquivalencias::desde_hoja(&h, Path::new("eq.xlsx")) {
            Err(Error::ColumnasFaltantes { faltantes, .. }) => assert_eq!(faltantes, ["Interno", "Objeto"]),
            otro => panic!("se esperaba ColumnasFaltantes, llegó {:?}", otro),
        }
    }
}
