//! Plantilla de cargue masivo CRP.
//!
//! Cada fila de tabla con al menos diez celdas de los PDF de contratos es un
//! compromiso: columna 0 número de compromiso, 4 identificación del
//! beneficiario, 7 CDP original y 9 importe. El CDP se concilia contra la
//! tabla de equivalencias; lo que no cuadra se marca y el lote continúa.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook;
use tracing::{debug, info};

use crate::config::CamposCrp;
use crate::equivalencias::{DatosCdp, TablaEquivalencias, NO_ENCONTRADO};
use crate::error::Resultado;
use crate::libro::{agregar_hoja, agregar_hoja_celdas, Celda, FilaPlantilla};
use crate::lote::{recorrer, ArchivoFallido};
use crate::pdf;
use crate::texto::{limpiar_numero, normalizar_texto};

/// Celdas mínimas de una fila de compromiso.
pub const MIN_CELDAS: usize = 10;

const COL_COMPROMISO: usize = 0;
const COL_BENEFICIARIO: usize = 4;
const COL_CDP: usize = 7;
const COL_IMPORTE: usize = 9;

pub const COLUMNAS_CRP: [&str; 24] = [
    "CRP",
    "Posición",
    "Fecha Documento",
    "Fecha Contabilización",
    "Sociedad",
    "Clase Documento",
    "Moneda",
    "Importe",
    "CDP",
    "Posición del CDP",
    "Objeto",
    "Tipo de compromiso",
    "No. Compromiso",
    "Fecha Inicial",
    "Fecha Final",
    "Tipo de Pago",
    "Modo Selección",
    "Tipo Documento Beneficiario",
    "Identificación Beneficiario",
    "ID Solicitante",
    "ID Responsable",
    "Num. Ext. Entidad",
    "CDP Original",
    "Fuente PDF",
];

static CDP_PROBABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{3,}$").unwrap());

/// Motivo por el que una fila queda en el reporte de inconsistencias.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Problema {
    CdpInvalidoOVacio,
    CdpNoEncontrado,
    ObjetoNoEncontrado,
    ImporteInvalido,
    BeneficiarioVacio,
}

impl Problema {
    pub fn codigo(self) -> &'static str {
        match self {
            Problema::CdpInvalidoOVacio => "CDP_ORIGINAL_INVALIDO_O_VACIO",
            Problema::CdpNoEncontrado => "CDP_NO_ENCONTRADO_EN_EQUIVALENCIAS",
            Problema::ObjetoNoEncontrado => "OBJETO_NO_ENCONTRADO",
            Problema::ImporteInvalido => "IMPORTE_EN_CERO_O_INVALIDO",
            Problema::BeneficiarioVacio => "IDENTIFICACION_BENEFICIARIO_VACIA",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegistroCrp {
    pub importe: u64,
    /// Número interno del CDP, o `NO ENCONTRADO`.
    pub cdp: String,
    pub posicion_cdp: String,
    pub objeto: String,
    pub tipo_compromiso: u32,
    pub no_compromiso: String,
    pub identificacion_beneficiario: String,
    pub cdp_original: String,
    pub fuente_pdf: String,
}

/// Una fila del reporte de inconsistencias.
#[derive(Debug, Clone, PartialEq)]
pub struct Inconsistencia {
    pub fuente_pdf: String,
    pub fila_pdf: usize,
    pub cdp_original: String,
    pub no_compromiso: String,
    pub importe: u64,
    pub problemas: Vec<Problema>,
}

impl Inconsistencia {
    pub fn problemas_texto(&self) -> String {
        self.problemas
            .iter()
            .map(|p| p.codigo())
            .collect::<Vec<_>>()
            .join(";")
    }
}

impl FilaPlantilla for Inconsistencia {
    fn encabezados() -> &'static [&'static str] {
        &["Fuente PDF", "Fila PDF", "CDP Original", "No. Compromiso", "Importe", "Problemas"]
    }

    fn celdas(&self) -> Vec<Celda> {
        vec![
            self.fuente_pdf.as_str().into(),
            (self.fila_pdf as u64).into(),
            self.cdp_original.as_str().into(),
            self.no_compromiso.as_str().into(),
            self.importe.into(),
            self.problemas_texto().into(),
        ]
    }
}

/// 145 para servicios profesionales, 148 para servicios de apoyo, 0 si no.
pub fn tipo_compromiso(objeto: &str) -> u32 {
    let objeto = objeto.to_lowercase();
    if objeto.contains("servicios profesionales") {
        145
    } else if objeto.contains("servicios de apoyo") {
        148
    } else {
        0
    }
}

/// Un código CDP plausible es de tres o más dígitos.
pub fn es_cdp_probable(valor: &str) -> bool {
    CDP_PROBABLE.is_match(valor.trim())
}

/// Concilia las filas de tabla de un PDF contra las equivalencias.
///
/// Las filas con menos de [`MIN_CELDAS`] celdas se ignoran. Cada fila
/// aceptada produce un registro; si además tiene problemas produce
/// exactamente una [`Inconsistencia`]. Nunca falla.
pub fn construir_registros(
    filas: &[Vec<String>],
    tabla: &TablaEquivalencias,
    fuente_pdf: &str,
) -> (Vec<RegistroCrp>, Vec<Inconsistencia>) {
    let mut registros = Vec::new();
    let mut inconsistencias = Vec::new();
    let no_encontrado = DatosCdp::new(NO_ENCONTRADO, NO_ENCONTRADO);

    for (idx, fila) in filas.iter().enumerate() {
        if fila.len() < MIN_CELDAS {
            continue;
        }

        let cdp_original = fila[COL_CDP].trim().to_string();
        let importe = limpiar_numero(&fila[COL_IMPORTE]);
        let no_compromiso = normalizar_texto(&fila[COL_COMPROMISO]);
        let beneficiario = normalizar_texto(&fila[COL_BENEFICIARIO]);

        let mut problemas = Vec::new();
        if !es_cdp_probable(&cdp_original) {
            problemas.push(Problema::CdpInvalidoOVacio);
        }

        let datos = match tabla.buscar(&cdp_original) {
            Some(d) => d,
            None => {
                problemas.push(Problema::CdpNoEncontrado);
                &no_encontrado
            }
        };

        let objeto = normalizar_texto(&datos.objeto);
        if objeto == NO_ENCONTRADO {
            problemas.push(Problema::ObjetoNoEncontrado);
        }
        if importe == 0 {
            problemas.push(Problema::ImporteInvalido);
        }
        if beneficiario.is_empty() {
            problemas.push(Problema::BeneficiarioVacio);
        }

        if !problemas.is_empty() {
            debug!("Fila {} de {}: {:?}", idx + 1, fuente_pdf, problemas);
            inconsistencias.push(Inconsistencia {
                fuente_pdf: fuente_pdf.to_string(),
                fila_pdf: idx + 1,
                cdp_original: cdp_original.clone(),
                no_compromiso: no_compromiso.clone(),
                importe,
                problemas,
            });
        }

        registros.push(RegistroCrp {
            importe,
            cdp: datos.no_interno.clone(),
            posicion_cdp: "1".to_string(),
            tipo_compromiso: tipo_compromiso(&objeto),
            objeto,
            no_compromiso,
            identificacion_beneficiario: beneficiario,
            cdp_original,
            fuente_pdf: fuente_pdf.to_string(),
        });
    }

    (registros, inconsistencias)
}

/// Campos constantes más las fechas del día de generación.
#[derive(Debug, Clone)]
pub struct FijosCrp {
    pub campos: CamposCrp,
    /// Fecha del documento, contabilización e inicial (`dd.mm.aaaa`).
    pub fecha: String,
}

impl FijosCrp {
    pub fn new(campos: CamposCrp, hoy: NaiveDate) -> Self {
        Self {
            campos,
            fecha: hoy.format("%d.%m.%Y").to_string(),
        }
    }
}

/// Filas de la hoja `Plantilla_CRP`; `CRP` y `Num. Ext. Entidad` numeran
/// los registros desde 1.
pub fn filas_plantilla(registros: &[RegistroCrp], fijos: &FijosCrp) -> Vec<Vec<Celda>> {
    let c = &fijos.campos;
    registros
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let consecutivo = (i + 1) as u64;
            vec![
                consecutivo.into(),
                c.posicion.as_str().into(),
                fijos.fecha.as_str().into(),
                fijos.fecha.as_str().into(),
                c.sociedad.as_str().into(),
                c.clase_documento.as_str().into(),
                c.moneda.as_str().into(),
                r.importe.into(),
                r.cdp.as_str().into(),
                r.posicion_cdp.as_str().into(),
                r.objeto.as_str().into(),
                u64::from(r.tipo_compromiso).into(),
                r.no_compromiso.as_str().into(),
                fijos.fecha.as_str().into(),
                c.fecha_final.as_str().into(),
                c.tipo_pago.as_str().into(),
                c.modo_seleccion.as_str().into(),
                c.tipo_documento_beneficiario.as_str().into(),
                r.identificacion_beneficiario.as_str().into(),
                c.id_solicitante.as_str().into(),
                c.id_responsable.as_str().into(),
                consecutivo.into(),
                r.cdp_original.as_str().into(),
                r.fuente_pdf.as_str().into(),
            ]
        })
        .collect()
}

/// Resultado de un lote CRP.
#[derive(Debug, Default)]
pub struct LoteCrp {
    pub registros: Vec<RegistroCrp>,
    pub inconsistencias: Vec<Inconsistencia>,
    pub fallidos: Vec<ArchivoFallido>,
    /// Registros e inconsistencias por archivo, en orden de proceso.
    pub resumen: Vec<(String, usize, usize)>,
}

/// Procesa los PDF en secuencia. Un PDF ilegible queda en `fallidos`.
pub fn procesar_archivos(rutas: &[PathBuf], tabla: &TablaEquivalencias) -> LoteCrp {
    let recorrido = recorrer(rutas, |archivo, bytes| {
        let doc = pdf::cargar(bytes)?;
        let filas = pdf::filas_tablas(&doc);
        Ok(construir_registros(&filas, tabla, archivo))
    });

    let mut lote = LoteCrp {
        fallidos: recorrido.fallidos,
        ..LoteCrp::default()
    };
    for (archivo, (registros, inconsistencias)) in recorrido.procesados {
        info!(
            "Procesado PDF: {} records={} issues={}",
            archivo,
            registros.len(),
            inconsistencias.len()
        );
        lote.resumen.push((archivo, registros.len(), inconsistencias.len()));
        lote.registros.extend(registros);
        lote.inconsistencias.extend(inconsistencias);
    }
    lote
}

/// Escribe `Plantilla_CRP` e `Inconsistencias` en `destino`.
pub fn guardar_libro(destino: &Path, lote: &LoteCrp, fijos: &FijosCrp) -> Resultado<()> {
    let mut libro = Workbook::new();
    agregar_hoja_celdas(
        &mut libro,
        "Plantilla_CRP",
        &COLUMNAS_CRP,
        &filas_plantilla(&lote.registros, fijos),
    )?;
    agregar_hoja(&mut libro, "Inconsistencias", &lote.inconsistencias)?;
    libro.save(destino)?;
    info!("Plantilla guardada: {}", destino.display());
    Ok(())
}
