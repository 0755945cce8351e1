//! Recorrido secuencial de los archivos de un lote.

use std::path::PathBuf;

use tracing::{error, info};

use crate::error::Resultado;
use crate::texto::nombre_archivo;

/// Archivo que no se pudo leer o procesar; el lote sigue con los demás.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivoFallido {
    pub archivo: String,
    pub motivo: String,
}

/// Posición de un archivo del lote dentro de `procesados` o `fallidos`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Paso {
    Procesado(usize),
    Fallido(usize),
}

/// Resultado de procesar varios archivos uno tras otro.
#[derive(Debug)]
pub struct Recorrido<T> {
    pub procesados: Vec<(String, T)>,
    pub fallidos: Vec<ArchivoFallido>,
    /// Un paso por archivo, en el orden de entrada.
    pub orden: Vec<Paso>,
}

/// Lee cada archivo y aplica `procesar` a su contenido.
///
/// Un error de lectura o de procesamiento se reporta como
/// [`ArchivoFallido`] y no detiene el recorrido.
pub fn recorrer<T, F>(rutas: &[PathBuf], mut procesar: F) -> Recorrido<T>
where
    F: FnMut(&str, &[u8]) -> Resultado<T>,
{
    let mut recorrido = Recorrido {
        procesados: Vec::new(),
        fallidos: Vec::new(),
        orden: Vec::new(),
    };

    let total = rutas.len();
    for (i, ruta) in rutas.iter().enumerate() {
        let archivo = nombre_archivo(ruta);
        info!("[{}/{}] Procesando: {}", i + 1, total, archivo);

        let resultado = std::fs::read(ruta)
            .map_err(Into::into)
            .and_then(|bytes| procesar(&archivo, &bytes));

        match resultado {
            Ok(valor) => {
                recorrido.orden.push(Paso::Procesado(recorrido.procesados.len()));
                recorrido.procesados.push((archivo, valor));
            }
            Err(e) => {
                error!("Error procesando {}: {}", archivo, e);
                recorrido.orden.push(Paso::Fallido(recorrido.fallidos.len()));
                recorrido.fallidos.push(ArchivoFallido {
                    archivo,
                    motivo: e.to_string(),
                });
            }
        }
    }

    recorrido
}
