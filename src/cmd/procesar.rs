use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Local;

use planillas_usme::equivalencias::TablaEquivalencias;
use planillas_usme::usuarios::Permiso;
use planillas_usme::{cdp, crp, pagos, plantilla_pagos};

use super::{ahora, elegir_libro, elegir_pdfs, Contexto};

pub fn cmd_crp(
    ctx: &Contexto,
    pdfs: Vec<PathBuf>,
    equivalencias: Option<PathBuf>,
    salida: Option<PathBuf>,
) -> Result<()> {
    let sesion = ctx.acceso().exigir(Permiso::Procesar, ahora())?;
    let pdfs = elegir_pdfs(pdfs)?;
    let ruta_tabla = elegir_libro(equivalencias, "Seleccione la tabla de equivalencias CDP")?;
    let tabla = TablaEquivalencias::cargar(&ruta_tabla)
        .with_context(|| format!("No se pudo cargar la tabla de equivalencias {}", ruta_tabla.display()))?;
    println!("Tabla de equivalencias: {} CDP", tabla.len());

    let lote = crp::procesar_archivos(&pdfs, &tabla);
    for (archivo, registros, inconsistencias) in &lote.resumen {
        println!("  {}: {} registros, {} inconsistencias", archivo, registros, inconsistencias);
        ctx.bitacora.registrar(&format!(
            "Procesado PDF: {} records={} issues={}",
            archivo, registros, inconsistencias
        ))?;
    }
    ctx.reportar_fallidos(&lote.fallidos)?;
    if lote.registros.is_empty() {
        bail!("No se encontraron registros válidos.");
    }

    let destino = ctx.ruta_salida(salida, "Plantilla_CRP")?;
    let fijos = crp::FijosCrp::new(ctx.config.crp.clone(), Local::now().date_naive());
    crp::guardar_libro(&destino, &lote, &fijos)?;
    ctx.bitacora.registrar(&format!(
        "Plantilla guardada: {} por {}",
        destino.display(),
        sesion.usuario
    ))?;

    println!(
        "\n✓ {} registros, {} inconsistencias → {}",
        lote.registros.len(),
        lote.inconsistencias.len(),
        destino.display()
    );
    Ok(())
}

pub fn cmd_cdp(ctx: &Contexto, pdfs: Vec<PathBuf>, salida: Option<PathBuf>) -> Result<()> {
    let sesion = ctx.acceso().exigir(Permiso::Procesar, ahora())?;
    let pdfs = elegir_pdfs(pdfs)?;
    let hoy = Local::now().date_naive();

    let lote = cdp::procesar_archivos(&pdfs, hoy);
    for r in &lote.registros {
        println!("  {}: {}", r.archivo, r.estado());
        ctx.bitacora.registrar(&format!("Procesado PDF: {}", r.archivo))?;
    }
    ctx.reportar_fallidos(&lote.fallidos)?;

    let destino = ctx.ruta_salida(salida, "Plantilla_CDP")?;
    cdp::guardar_libro(&destino, &lote, &ctx.config.cdp, hoy)?;
    ctx.bitacora.registrar(&format!(
        "Plantilla guardada: {} por {}",
        destino.display(),
        sesion.usuario
    ))?;

    println!(
        "\n✓ {} de {} PDF exportados → {}",
        lote.registros.len(),
        lote.total_pdfs,
        destino.display()
    );
    Ok(())
}

pub fn cmd_pagos(ctx: &Contexto, pdfs: Vec<PathBuf>, salida: Option<PathBuf>) -> Result<()> {
    let sesion = ctx.acceso().exigir(Permiso::Procesar, ahora())?;
    let pdfs = elegir_pdfs(pdfs)?;

    let lote = pagos::procesar_archivos(&pdfs);
    ctx.reportar_fallidos(&lote.fallidos)?;

    let destino = ctx.ruta_salida(salida, "Consolidado_Pagos")?;
    pagos::guardar_libro(&destino, &lote)?;
    ctx.bitacora.registrar(&format!(
        "Consolidado guardado: {} ({} pagos) por {}",
        destino.display(),
        lote.pagos.len(),
        sesion.usuario
    ))?;

    println!("\n✓ {} pagos consolidados → {}", lote.pagos.len(), destino.display());
    Ok(())
}

pub fn cmd_plantilla_pagos(ctx: &Contexto, consolidado: Option<PathBuf>, salida: Option<PathBuf>) -> Result<()> {
    let sesion = ctx.acceso().exigir(Permiso::Procesar, ahora())?;
    let origen = elegir_libro(consolidado, "Seleccione el consolidado de pagos")?;

    let plantilla = plantilla_pagos::desde_archivo(&origen, &ctx.config.pagos, Local::now().date_naive())
        .with_context(|| format!("No se pudo leer el consolidado {}", origen.display()))?;

    let destino = ctx.ruta_salida(salida, "Plantilla_Pagos")?;
    plantilla_pagos::guardar_libro(&destino, &plantilla)?;
    ctx.bitacora.registrar(&format!(
        "Plantilla de pagos guardada: {} por {}",
        destino.display(),
        sesion.usuario
    ))?;

    let e = &plantilla.estadisticas;
    println!("Pagos: {}", e.pagos);
    println!("Filas generadas: {}", plantilla.filas.len());
    println!("Indicadores mapeados desde Reteica %: {}/{}", e.indicadores_mapeados, e.pagos);
    for (indicador, veces) in &e.indicadores_usados {
        println!("  Indicador {}: {}", indicador, veces);
    }
    println!("\n✓ Plantilla de pagos → {}", destino.display());
    Ok(())
}
