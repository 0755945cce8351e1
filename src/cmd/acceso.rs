use anyhow::{Context, Result};

use super::{ahora, Contexto};

pub fn cmd_ingresar(ctx: &Contexto, usuario: &str, clave: &str) -> Result<()> {
    let rol = ctx
        .acceso()
        .ingresar(usuario, clave, ahora())
        .context("No se pudo iniciar sesión")?;
    println!("✓ Sesión iniciada: {} ({})", usuario.trim().to_lowercase(), rol);
    Ok(())
}

pub fn cmd_salir(ctx: &Contexto) -> Result<()> {
    match ctx.acceso().salir()? {
        Some(usuario) => println!("✓ Sesión de {} cerrada", usuario),
        None => println!("No hay una sesión activa"),
    }
    Ok(())
}

pub fn cmd_estado(ctx: &Contexto) -> Result<()> {
    let politica = &ctx.config.acceso;
    let t = ahora();
    let estado = ctx.acceso().estado(t)?;

    match &estado.sesion {
        Some(s) => {
            println!("Sesión: {} ({})", s.usuario, s.rol);
            if let Some(restante) = estado.sesion_restante(politica, t) {
                println!("Expira por inactividad en {}s", restante.max(0));
            }
        }
        None => println!("Sesión: ninguna"),
    }
    println!("Intentos restantes: {}", estado.intentos_restantes(politica));
    match estado.bloqueo_restante(t) {
        Some(restante) => println!("Bloqueo: activo ({}s)", restante),
        None => println!("Bloqueo: no"),
    }
    println!(
        "Alertas automáticas: {}",
        if ctx.config.alertas_automaticas { "sí" } else { "no" }
    );
    Ok(())
}
