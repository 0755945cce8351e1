use std::path::Path;

use anyhow::{Context, Result};

use planillas_usme::usuarios::{normalizar, Permiso, Rol};

use super::{ahora, Contexto};

pub fn cmd_crear(ctx: &Contexto, usuario: &str, clave: &str, rol: Rol) -> Result<()> {
    let sesion = ctx.acceso().exigir(Permiso::Administrar, ahora())?;
    ctx.acceso().almacen()?.upsert(usuario, clave, rol)?;
    ctx.bitacora.registrar(&format!(
        "{} actualizó usuario={} role={}",
        sesion.usuario,
        normalizar(usuario),
        rol
    ))?;
    println!("✓ Usuario {} guardado ({})", normalizar(usuario), rol);
    Ok(())
}

pub fn cmd_importar(ctx: &Contexto, archivo: &Path) -> Result<()> {
    let sesion = ctx.acceso().exigir(Permiso::Administrar, ahora())?;
    let cargados = ctx
        .acceso()
        .almacen()?
        .importar(archivo)
        .with_context(|| format!("No se pudieron importar credenciales de {}", archivo.display()))?;
    ctx.bitacora.registrar(&format!(
        "{} importó {} usuarios desde {}",
        sesion.usuario,
        cargados,
        archivo.display()
    ))?;
    println!("✓ {} usuarios importados", cargados);
    Ok(())
}

/// No exige sesión: es la salida cuando nadie puede ingresar.
pub fn cmd_restablecer(ctx: &Contexto, codigo: &str) -> Result<()> {
    let mut almacen = ctx.acceso().almacen()?;
    if let Err(e) = almacen.restablecer(codigo, &ctx.config.acceso.codigo_reset) {
        ctx.bitacora.registrar("Intento de restablecimiento con código incorrecto")?;
        return Err(e.into());
    }
    ctx.bitacora.registrar("Usuarios restablecidos a los valores por defecto")?;
    println!("✓ Usuarios restablecidos. Ahora puedes entrar con admin/admin123.");
    Ok(())
}
