//! Bitácora de auditoría: `accesos.log` y `alerts.log`.
//!
//! Cada línea es `timestamp - mensaje`. Las alertas se escriben en ambos
//! archivos como `timestamp - ALERT - NIVEL - mensaje`.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Local;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook;
use tracing::{debug, info, warn};

use crate::error::Resultado;
use crate::libro::{agregar_hoja, Celda, FilaPlantilla};

pub const ARCHIVO_ACCESOS: &str = "accesos.log";
pub const ARCHIVO_ALERTAS: &str = "alerts.log";

static LINEA_LOG: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2}[^-]+)\s-\s(.+)$").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Nivel {
    Info,
    Warning,
    Error,
}

impl Nivel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Nivel::Info => "INFO",
            Nivel::Warning => "WARNING",
            Nivel::Error => "ERROR",
        }
    }
}

/// Escritor append-only de los archivos de auditoría.
#[derive(Debug, Clone)]
pub struct Bitacora {
    accesos: PathBuf,
    alertas: PathBuf,
}

impl Bitacora {
    /// Bitácora dentro de `dir_logs`; el directorio se crea al escribir.
    pub fn new(dir_logs: &Path) -> Self {
        Self {
            accesos: dir_logs.join(ARCHIVO_ACCESOS),
            alertas: dir_logs.join(ARCHIVO_ALERTAS),
        }
    }

    pub fn ruta_accesos(&self) -> &Path {
        &self.accesos
    }

    pub fn ruta_alertas(&self) -> &Path {
        &self.alertas
    }

    /// Registra un evento en `accesos.log`.
    pub fn registrar(&self, mensaje: &str) -> Resultado<()> {
        let ts = Local::now().format("%Y-%m-%d %H:%M:%S,%3f");
        debug!("Bitácora: {}", mensaje);
        agregar_linea(&self.accesos, &format!("{} - {}\n", ts, mensaje))
    }

    /// Registra una alerta en `alerts.log` y en `accesos.log`.
    pub fn alerta(&self, mensaje: &str, nivel: Nivel) -> Resultado<()> {
        let ts = Local::now().format("%Y-%m-%d %H:%M:%S");
        let linea = format!("{} - ALERT - {} - {}\n", ts, nivel.as_str(), mensaje);
        agregar_linea(&self.alertas, &linea)?;
        agregar_linea(&self.accesos, &linea)?;
        info!("ALERTA: {}", mensaje);
        Ok(())
    }

    pub fn leer_accesos(&self) -> Resultado<String> {
        leer_si_existe(&self.accesos)
    }

    pub fn leer_alertas(&self) -> Resultado<String> {
        leer_si_existe(&self.alertas)
    }

    /// Copia `accesos.log` a `accesos_report_YYYYmmdd_HHMMSS.log` junto al
    /// original. `None` si todavía no hay registro de accesos.
    pub fn versionar(&self) -> Resultado<Option<PathBuf>> {
        if !self.accesos.exists() {
            warn!("No hay registro de accesos para versionar");
            return Ok(None);
        }
        let ts = Local::now().format("%Y%m%d_%H%M%S");
        let destino = self
            .accesos
            .with_file_name(format!("accesos_report_{}.log", ts));
        std::fs::copy(&self.accesos, &destino)?;
        info!("Reporte versionado en {}", destino.display());
        Ok(Some(destino))
    }

    /// Libro con las hojas `Accesos` y `Alertas`.
    pub fn exportar(&self, destino: &Path) -> Resultado<()> {
        let accesos = parsear_log(&self.leer_accesos()?);
        let alertas = parsear_log(&self.leer_alertas()?);

        let mut libro = Workbook::new();
        agregar_hoja(&mut libro, "Accesos", &accesos)?;
        agregar_hoja(&mut libro, "Alertas", &alertas)?;
        libro.save(destino)?;

        info!(
            "Auditoría exportada: {} accesos, {} alertas → {}",
            accesos.len(),
            alertas.len(),
            destino.display()
        );
        Ok(())
    }
}

fn agregar_linea(ruta: &Path, linea: &str) -> Resultado<()> {
    if let Some(dir) = ruta.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut archivo = OpenOptions::new().create(true).append(true).open(ruta)?;
    archivo.write_all(linea.as_bytes())?;
    Ok(())
}

fn leer_si_existe(ruta: &Path) -> Resultado<String> {
    if !ruta.exists() {
        return Ok(String::new());
    }
    let bytes = std::fs::read(ruta)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntradaLog {
    pub timestamp: String,
    pub mensaje: String,
}

impl FilaPlantilla for EntradaLog {
    fn encabezados() -> &'static [&'static str] {
        &["timestamp", "mensaje"]
    }

    fn celdas(&self) -> Vec<Celda> {
        vec![self.timestamp.as_str().into(), self.mensaje.as_str().into()]
    }
}

/// Separa cada línea no vacía en timestamp y mensaje. Las líneas que no
/// empiezan con fecha quedan con timestamp vacío.
pub fn parsear_log(texto: &str) -> Vec<EntradaLog> {
    texto
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|linea| match LINEA_LOG.captures(linea) {
            Some(c) => EntradaLog {
                timestamp: c[1].trim().to_string(),
                mensaje: c[2].trim().to_string(),
            },
            None => EntradaLog {
                timestamp: String::new(),
                mensaje: linea.to_string(),
            },
        })
        .collect()
}
