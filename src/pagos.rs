//! Consolidado de pagos: un registro por PDF de orden de pago.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::error::Resultado;
use crate::libro::{agregar_hoja, Celda, FilaPlantilla};
use crate::lote::{recorrer, ArchivoFallido};
use crate::pdf;
use crate::texto::limpiar_numero;

static CONTRATO: Lazy<Regex> = Lazy::new(|| Regex::new(r"CONTRATO No\.?\s*(CPS\s*\d+-\d+)").unwrap());
static CONTRATISTA: Lazy<Regex> = Lazy::new(|| Regex::new(r"CONTRATISTA:\s*(.+)").unwrap());
static NIT: Lazy<Regex> = Lazy::new(|| Regex::new(r"NIT\. o C\.C\.\s*([\d.\-]+)").unwrap());
static PAGO: Lazy<Regex> = Lazy::new(|| Regex::new(r"PAGO No\.\s*(\d+)").unwrap());
static VALOR_BRUTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"VALOR BRUTO.*?\$ ?([\d.,]+)").unwrap());
static BASE_RETEICA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Reteica.*?\$ ?([\d.,]+)").unwrap());
static PORCENTAJE_RETEICA: Lazy<Regex> = Lazy::new(|| Regex::new(r"Reteica.*?(\d+[.,]?\d*%)").unwrap());
static VALOR_RETEICA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)Reteica.*?\$ ?([\d.,]+)$").unwrap());
static OTRAS_RETENCIONES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(Retefuente.*?|ReteIva).*?\$ ?([\d.,]+)").unwrap());
static TOTAL_DESCUENTOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"TOTAL DESCUENTOS.*?\$ ?([\d.,]+)").unwrap());
static NETO: Lazy<Regex> = Lazy::new(|| Regex::new(r"NETO A PAGAR.*?\$ ?([\d.,]+)").unwrap());

/// Valores brutos por debajo de este umbral vienen expresados en millones.
const UMBRAL_MILLONES: u64 = 1_000;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DatosPago {
    pub contrato: Option<String>,
    pub contratista: Option<String>,
    pub nit: Option<String>,
    pub pago_no: Option<u64>,
    pub valor_bruto: Option<u64>,
    pub base_reteica: Option<u64>,
    pub reteica_porcentaje: Option<String>,
    pub reteica_valor: Option<u64>,
    pub total_descuentos: u64,
    pub neto_a_pagar: Option<u64>,
}

fn capturar<'t>(re: &Regex, texto: &'t str) -> Option<&'t str> {
    re.captures(texto).and_then(|c| c.get(1)).map(|m| m.as_str())
}

/// Extrae los campos de una orden de pago.
///
/// `total_descuentos` suma Reteica y las demás retenciones halladas, salvo
/// que el documento traiga su propia línea `TOTAL DESCUENTOS`.
pub fn extraer_pago(texto: &str) -> DatosPago {
    let mut datos = DatosPago {
        contrato: capturar(&CONTRATO, texto).map(str::to_string),
        contratista: capturar(&CONTRATISTA, texto).map(|s| s.trim().to_string()),
        nit: capturar(&NIT, texto).map(str::to_string),
        pago_no: capturar(&PAGO, texto).and_then(|s| s.parse().ok()),
        valor_bruto: capturar(&VALOR_BRUTO, texto).map(|s| {
            let bruto = limpiar_numero(s);
            if bruto < UMBRAL_MILLONES {
                bruto * 1_000_000
            } else {
                bruto
            }
        }),
        base_reteica: capturar(&BASE_RETEICA, texto).map(limpiar_numero),
        reteica_porcentaje: capturar(&PORCENTAJE_RETEICA, texto).map(str::to_string),
        reteica_valor: capturar(&VALOR_RETEICA, texto).map(limpiar_numero),
        ..DatosPago::default()
    };

    datos.total_descuentos = datos.reteica_valor.unwrap_or(0);
    for caps in OTRAS_RETENCIONES.captures_iter(texto) {
        datos.total_descuentos = datos.total_descuentos.saturating_add(limpiar_numero(&caps[2]));
    }

    if let Some(total) = capturar(&TOTAL_DESCUENTOS, texto) {
        datos.total_descuentos = limpiar_numero(total);
    }
    datos.neto_a_pagar = capturar(&NETO, texto).map(limpiar_numero);

    datos
}

fn opcional<T: Into<Celda>>(valor: Option<T>) -> Celda {
    valor.map(Into::into).unwrap_or(Celda::Vacia)
}

impl FilaPlantilla for DatosPago {
    fn encabezados() -> &'static [&'static str] {
        &[
            "Contrato No",
            "Contratista",
            "NIT o CC",
            "Pago No",
            "Valor Bruto",
            "Base Reteica",
            "Reteica %",
            "Reteica Valor",
            "Total Descuentos",
            "Neto a Pagar",
        ]
    }

    fn celdas(&self) -> Vec<Celda> {
        vec![
            opcional(self.contrato.clone()),
            opcional(self.contratista.clone()),
            opcional(self.nit.clone()),
            opcional(self.pago_no),
            opcional(self.valor_bruto),
            opcional(self.base_reteica),
            opcional(self.reteica_porcentaje.clone()),
            opcional(self.reteica_valor),
            self.total_descuentos.into(),
            opcional(self.neto_a_pagar),
        ]
    }
}

#[derive(Debug, Default)]
pub struct LotePagos {
    pub pagos: Vec<DatosPago>,
    pub fallidos: Vec<ArchivoFallido>,
}

pub fn procesar_archivos(rutas: &[PathBuf]) -> LotePagos {
    let recorrido = recorrer(rutas, |_, bytes| {
        let doc = pdf::cargar(bytes)?;
        Ok(extraer_pago(&pdf::texto_paginas(&doc).join("\n")))
    });

    let mut lote = LotePagos {
        fallidos: recorrido.fallidos,
        ..LotePagos::default()
    };
    for (archivo, pago) in recorrido.procesados {
        info!(
            "Procesado PDF: {} contrato={} neto={:?}",
            archivo,
            pago.contrato.as_deref().unwrap_or("-"),
            pago.neto_a_pagar
        );
        lote.pagos.push(pago);
    }
    lote
}

/// Escribe la hoja `Consolidado` en `destino`.
pub fn guardar_libro(destino: &Path, lote: &LotePagos) -> Resultado<()> {
    let mut libro = Workbook::new();
    agregar_hoja(&mut libro, "Consolidado", &lote.pagos)?;
    libro.save(destino)?;
    info!("Consolidado guardado: {}", destino.display());
    Ok(())
}
