//! Errores de la librería.

use std::path::PathBuf;

use thiserror::Error;

/// Errores que pueden abortar una operación completa.
///
/// Los problemas de validación por registro no son errores: se recogen como
/// [`crate::crp::Inconsistencia`] y nunca detienen el lote.
#[derive(Debug, Error)]
pub enum Error {
    #[error("error leyendo el PDF: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("error leyendo la hoja de cálculo: {0}")]
    LecturaExcel(#[from] calamine::Error),

    #[error("error escribiendo la hoja de cálculo: {0}")]
    EscrituraExcel(#[from] rust_xlsxwriter::XlsxError),

    #[error("error leyendo CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON inválido: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuración inválida: {0}")]
    Config(#[from] toml::de::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// El libro no trae las columnas esperadas; aborta el lote.
    #[error("el archivo {archivo} no tiene las columnas esperadas ({})", faltantes.join(", "))]
    ColumnasFaltantes {
        archivo: PathBuf,
        faltantes: Vec<String>,
    },

    #[error("el libro {0} no tiene hojas")]
    LibroVacio(PathBuf),

    #[error("credenciales inválidas")]
    CredencialesInvalidas,

    #[error("cuenta bloqueada temporalmente, intenta en {restante}s")]
    Bloqueado { restante: i64 },

    #[error("sesión de {usuario} expirada por inactividad, inicia sesión nuevamente")]
    SesionExpirada { usuario: String },

    #[error("no hay una sesión activa, usa `planillas ingresar`")]
    SinSesion,

    #[error("el rol {rol} no tiene permiso para {accion}")]
    PermisoDenegado { rol: String, accion: &'static str },

    #[error("código de restablecimiento incorrecto")]
    CodigoResetIncorrecto,

    #[error("{0}")]
    Datos(String),
}

pub type Resultado<T> = std::result::Result<T, Error>;
