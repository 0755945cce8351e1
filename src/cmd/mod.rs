pub mod acceso;
pub mod auditoria;
pub mod procesar;
pub mod usuarios;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use rfd::FileDialog;
use tracing::error;

use planillas_usme::acceso::ControlAcceso;
use planillas_usme::auditoria::{Bitacora, Nivel};
use planillas_usme::config::Config;
use planillas_usme::lote::ArchivoFallido;

/// Configuración y bitácora compartidas por los comandos.
pub struct Contexto {
    pub config: Config,
    pub bitacora: Bitacora,
}

impl Contexto {
    pub fn cargar(ruta_config: Option<&Path>) -> Result<Self> {
        let config = Config::cargar(ruta_config).context("No se pudo leer la configuración")?;
        config
            .rutas
            .crear_directorios()
            .context("No se pudieron crear los directorios de trabajo")?;
        let bitacora = Bitacora::new(&config.rutas.logs);
        Ok(Self { config, bitacora })
    }

    pub fn acceso(&self) -> ControlAcceso<'_> {
        ControlAcceso::new(&self.config, &self.bitacora)
    }

    /// Ejecuta `comando`; si falla y las alertas automáticas están
    /// activas, deja una alerta `ERROR` antes de devolver el error.
    pub fn con_alerta(&self, comando: impl FnOnce() -> Result<()>) -> Result<()> {
        let resultado = comando();
        if let Err(e) = &resultado {
            if self.config.alertas_automaticas {
                if let Err(e2) = self.bitacora.alerta(&format!("Error general: {:#}", e), Nivel::Error) {
                    error!("No se pudo registrar la alerta: {}", e2);
                }
            }
        }
        resultado
    }

    /// Registra cada archivo fallido y, con alertas automáticas, una alerta
    /// por archivo.
    pub fn reportar_fallidos(&self, fallidos: &[ArchivoFallido]) -> Result<()> {
        for f in fallidos {
            println!("✗ {}: {}", f.archivo, f.motivo);
            self.bitacora
                .registrar(&format!("Error procesando {}: {}", f.archivo, f.motivo))?;
            if self.config.alertas_automaticas {
                self.bitacora
                    .alerta(&format!("Error procesando {}: {}", f.archivo, f.motivo), Nivel::Error)?;
            }
        }
        Ok(())
    }

    /// `salida` si se indicó; si no, `<salidas>/<prefijo>_YYYYmmdd_HHMMSS.xlsx`.
    pub fn ruta_salida(&self, salida: Option<PathBuf>, prefijo: &str) -> Result<PathBuf> {
        let ruta = match salida {
            Some(r) => r,
            None => {
                let ts = Local::now().format("%Y%m%d_%H%M%S");
                self.config.rutas.salidas.join(format!("{}_{}.xlsx", prefijo, ts))
            }
        };
        if let Some(dir) = ruta.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir).with_context(|| format!("No se pudo crear {}", dir.display()))?;
        }
        Ok(ruta)
    }
}

/// Segundos Unix actuales.
pub fn ahora() -> i64 {
    Utc::now().timestamp()
}

/// Usa `pdfs` o, si está vacío, abre el selector de archivos.
pub fn elegir_pdfs(pdfs: Vec<PathBuf>) -> Result<Vec<PathBuf>> {
    if !pdfs.is_empty() {
        return Ok(pdfs);
    }
    println!("Seleccione los archivos PDF a procesar...");
    let elegidos = FileDialog::new()
        .add_filter("Archivos PDF", &["pdf"])
        .set_title("Seleccionar archivos PDF")
        .pick_files()
        .unwrap_or_default();
    if elegidos.is_empty() {
        anyhow::bail!("No se seleccionó ningún archivo PDF.");
    }
    Ok(elegidos)
}

/// Usa `ruta` o, si no se indicó, abre el selector para un libro de Excel.
pub fn elegir_libro(ruta: Option<PathBuf>, titulo: &str) -> Result<PathBuf> {
    if let Some(r) = ruta {
        return Ok(r);
    }
    println!("{}...", titulo);
    FileDialog::new()
        .add_filter("Archivos Excel", &["xlsx", "xls"])
        .set_title(titulo)
        .pick_file()
        .context("No se seleccionó ningún archivo Excel.")
}
