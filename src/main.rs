//! `planillas` - Plantillas de cargue masivo del FDL Usme
//!
//! Procesa PDF de contratos, solicitudes CDP y órdenes de pago, y genera los
//! libros de Excel para el cargue en el sistema contable.

mod cmd;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use planillas_usme::auditoria::Nivel;
use planillas_usme::usuarios::Rol;

use cmd::Contexto;

#[derive(Parser)]
#[command(name = "planillas")]
#[command(about = "Plantillas de cargue masivo CRP, CDP y pagos")]
#[command(version)]
struct Cli {
    /// Archivo de configuración (por defecto `planillas.toml` si existe)
    #[arg(long, global = true, env = "PLANILLAS_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Iniciar sesión
    Ingresar {
        #[arg(short, long)]
        usuario: String,

        #[arg(short, long, env = "PLANILLAS_CLAVE", hide_env_values = true)]
        clave: String,
    },

    /// Cerrar la sesión activa
    Salir,

    /// Mostrar sesión, intentos restantes y bloqueo
    Estado,

    /// Generar la plantilla CRP a partir de PDF de contratos
    Crp {
        /// PDF a procesar (si no se indican se abre un selector)
        pdfs: Vec<PathBuf>,

        /// Libro con la tabla de equivalencias CDP
        #[arg(short, long)]
        equivalencias: Option<PathBuf>,

        /// Libro de salida
        #[arg(short, long)]
        salida: Option<PathBuf>,
    },

    /// Generar la plantilla CDP a partir de PDF de solicitudes
    Cdp {
        pdfs: Vec<PathBuf>,

        #[arg(short, long)]
        salida: Option<PathBuf>,
    },

    /// Consolidar órdenes de pago en PDF
    Pagos {
        pdfs: Vec<PathBuf>,

        #[arg(short, long)]
        salida: Option<PathBuf>,
    },

    /// Generar la plantilla de pagos (C / P40 / P31) desde el consolidado
    PlantillaPagos {
        /// Libro consolidado de pagos
        consolidado: Option<PathBuf>,

        #[arg(short, long)]
        salida: Option<PathBuf>,
    },

    /// Bitácora de accesos y alertas
    Auditoria {
        #[command(subcommand)]
        accion: AccionAuditoria,
    },

    /// Administración de usuarios
    Usuarios {
        #[command(subcommand)]
        accion: AccionUsuarios,
    },
}

#[derive(Subcommand)]
enum AccionAuditoria {
    /// Mostrar accesos y alertas
    Ver,

    /// Exportar accesos y alertas a Excel
    Exportar {
        #[arg(short, long)]
        salida: Option<PathBuf>,
    },

    /// Copiar el registro de accesos con marca de tiempo
    Versionar,

    /// Registrar una alerta manual
    Alerta {
        mensaje: String,

        #[arg(short, long, value_enum, default_value = "info")]
        nivel: Nivel,
    },
}

#[derive(Subcommand)]
enum AccionUsuarios {
    /// Crear o actualizar un usuario
    Crear {
        usuario: String,

        #[arg(short, long)]
        clave: String,

        #[arg(short, long, value_enum, default_value = "usuario")]
        rol: Rol,
    },

    /// Cargar usuarios desde un CSV o Excel con columnas usuario / clave
    Importar { archivo: PathBuf },

    /// Restablecer los usuarios por defecto con el código de recuperación
    Restablecer { codigo: String },
}

fn main() -> Result<()> {
    let filtro = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    FmtSubscriber::builder()
        .with_env_filter(filtro)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    let ctx = Contexto::cargar(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingresar { usuario, clave } => cmd::acceso::cmd_ingresar(&ctx, &usuario, &clave)?,
        Commands::Salir => cmd::acceso::cmd_salir(&ctx)?,
        Commands::Estado => cmd::acceso::cmd_estado(&ctx)?,
        Commands::Crp {
            pdfs,
            equivalencias,
            salida,
        } => ctx.con_alerta(|| cmd::procesar::cmd_crp(&ctx, pdfs, equivalencias, salida))?,
        Commands::Cdp { pdfs, salida } => ctx.con_alerta(|| cmd::procesar::cmd_cdp(&ctx, pdfs, salida))?,
        Commands::Pagos { pdfs, salida } => ctx.con_alerta(|| cmd::procesar::cmd_pagos(&ctx, pdfs, salida))?,
        Commands::PlantillaPagos { consolidado, salida } => {
            ctx.con_alerta(|| cmd::procesar::cmd_plantilla_pagos(&ctx, consolidado, salida))?
        }
        Commands::Auditoria { accion } => match accion {
            AccionAuditoria::Ver => cmd::auditoria::cmd_ver(&ctx)?,
            AccionAuditoria::Exportar { salida } => cmd::auditoria::cmd_exportar(&ctx, salida)?,
            AccionAuditoria::Versionar => cmd::auditoria::cmd_versionar(&ctx)?,
            AccionAuditoria::Alerta { mensaje, nivel } => cmd::auditoria::cmd_alerta(&ctx, &mensaje, nivel)?,
        },
        Commands::Usuarios { accion } => match accion {
            AccionUsuarios::Crear { usuario, clave, rol } => cmd::usuarios::cmd_crear(&ctx, &usuario, &clave, rol)?,
            AccionUsuarios::Importar { archivo } => cmd::usuarios::cmd_importar(&ctx, &archivo)?,
            AccionUsuarios::Restablecer { codigo } => cmd::usuarios::cmd_restablecer(&ctx, &codigo)?,
        },
    }

    Ok(())
}
