use std::path::PathBuf;

use anyhow::Result;

use planillas_usme::auditoria::Nivel;
use planillas_usme::usuarios::Permiso;

use super::{ahora, Contexto};

pub fn cmd_ver(ctx: &Contexto) -> Result<()> {
    ctx.acceso().exigir(Permiso::VerAuditoria, ahora())?;

    let accesos = ctx.bitacora.leer_accesos()?;
    let alertas = ctx.bitacora.leer_alertas()?;

    println!("== Accesos ({}) ==", ctx.bitacora.ruta_accesos().display());
    if accesos.trim().is_empty() {
        println!("(sin registros)");
    } else {
        print!("{}", accesos);
    }
    println!("\n== Alertas ({}) ==", ctx.bitacora.ruta_alertas().display());
    if alertas.trim().is_empty() {
        println!("(sin alertas)");
    } else {
        print!("{}", alertas);
    }
    Ok(())
}

pub fn cmd_exportar(ctx: &Contexto, salida: Option<PathBuf>) -> Result<()> {
    let sesion = ctx.acceso().exigir(Permiso::DescargarAuditoria, ahora())?;
    let destino = ctx.ruta_salida(salida, "Auditoria")?;
    ctx.bitacora.exportar(&destino)?;
    ctx.bitacora
        .registrar(&format!("Auditoría exportada: {} por {}", destino.display(), sesion.usuario))?;
    println!("✓ Auditoría exportada → {}", destino.display());
    Ok(())
}

pub fn cmd_versionar(ctx: &Contexto) -> Result<()> {
    ctx.acceso().exigir(Permiso::DescargarAuditoria, ahora())?;
    match ctx.bitacora.versionar()? {
        Some(copia) => println!("✓ Reporte versionado → {}", copia.display()),
        None => println!("No hay registro de accesos para versionar"),
    }
    Ok(())
}

pub fn cmd_alerta(ctx: &Contexto, mensaje: &str, nivel: Nivel) -> Result<()> {
    ctx.acceso().exigir(Permiso::VerAuditoria, ahora())?;
    ctx.bitacora.alerta(mensaje, nivel)?;
    println!("✓ Alerta registrada ({})", nivel.as_str());
    Ok(())
}
