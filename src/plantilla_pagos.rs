//! Plantilla de pagos a partir del consolidado.
//!
//! Cada pago del consolidado genera tres filas: `C` (cabecera), `P 40`
//! (gasto) y `P 31` (cuenta por pagar con retención). Las columnas del
//! consolidado se buscan por fragmentos de su nombre, y el indicador de
//! retención sale del porcentaje de Reteica.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use calamine::Data;
use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::{Format, Workbook};
use tracing::{debug, info, warn};

use crate::config::CamposPagos;
use crate::error::Resultado;
use crate::libro::{
    celda_vacia, escribir_celda_con_formato, formato_izquierda, leer_primera_hoja, texto_celda, Celda, HojaLeida,
};
use crate::texto::rellenar_ceros;

pub const COLUMNAS_PAGOS: [&str; 43] = [
    "Tipo Registro P",
    "Clave Contab.",
    "Codigo de la cuenta",
    "Tipo Ident",
    "No Identificación",
    "Indicador CME",
    "Cuenta contable",
    "importe",
    "Indicador de IVA",
    "RP Doc Presupuestal",
    "Posc Doc Pres",
    "Pros Pre",
    "Programa de financiación",
    "Fondo",
    "Centro Gestor",
    "Centro de costo",
    "Centro Beneficio",
    "Orden CO",
    "Elemento PEP",
    "Grafo",
    "Area funcional",
    "Segmento",
    "Fecha Base",
    "Condicion de Pago",
    "Asignación",
    "Texto",
    "Bloqueo Pago",
    "Receptor Alternativo",
    "Tipo Ident",
    "No Identificación",
    "Via de Pago",
    "Banco Propio",
    "Id Cta",
    "Ref 1",
    "Ref 2",
    "Referencia Pago",
    "Código Bco",
    "No Cuenta",
    "Tipo Cta",
    "Tipo de retenciones",
    "Indicador de retención",
    "Base imponible de retención",
    "Importe de retención",
];

/// Anchos de columna A..AQ.
pub const ANCHOS_PAGOS: [f64; 43] = [
    3.0, 3.0, 12.0, 3.0, 15.0, 12.0, 12.0, 10.0, 3.0, 20.0, 25.0, 8.0, 25.0, 8.0, 12.0, 12.0, 15.0, 8.0,
    12.0, 8.0, 15.0, 10.0, 10.0, 15.0, 12.0, 30.0, 12.0, 20.0, 3.0, 15.0, 10.0, 12.0, 8.0, 8.0, 8.0, 15.0,
    10.0, 20.0, 8.0, 20.0, 20.0, 25.0, 20.0,
];

/// Porcentaje de Reteica → indicador de retención, en el orden en que lo
/// mantiene contabilidad. Un porcentaje repetido queda con el último
/// indicador de la lista.
const INDICADORES_RETEICA: &[(&str, &str)] = &[
    ("0,100%", "01"),
    ("0,050%", "02"),
    ("0,200%", "03"),
    ("0,100%", "05"),
    ("0,110%", "06"),
    ("0,050%", "07"),
    ("2,000%", "08"),
    ("2,000%", "09"),
    ("0,350%", "10"),
    ("0,400%", "11"),
    ("1,000%", "12"),
    ("0,010%", "13"),
    ("0,100%", "14"),
    ("0,150%", "15"),
    ("0,250%", "16"),
    ("0,350%", "17"),
    ("0,600%", "18"),
    ("0,200%", "19"),
    ("0,250%", "20"),
    ("1,000%", "21"),
    ("1,100%", "22"),
    ("0,350%", "23"),
    ("0,600%", "24"),
    ("0,700%", "26"),
    ("0,400%", "27"),
    ("0,100%", "28"),
    ("0,200%", "29"),
    ("0,350%", "30"),
    ("0,400%", "31"),
    ("0,600%", "32"),
    ("1,104%", "33"),
    ("1,380%", "34"),
    ("0,414%", "35"),
    ("0,690%", "36"),
    ("0,700%", "37"),
    ("0,800%", "38"),
    ("0,966%", "39"),
    ("1,500%", "40"),
    ("0,250%", "41"),
    ("0,500%", "42"),
    ("0,712%", "86"),
    ("0,766%", "87"),
    ("0,866%", "88"),
    ("0,998%", "89"),
    ("1,014%", "91"),
    ("1,200%", "92"),
    ("1,214%", "R5"),
    ("1,400%", "94"),
    ("0,760%", "R3"),
    ("0,736%", "96"),
    ("1,030%", "97"),
    ("1,062%", "R4"),
    ("1,176%", "98"),
    ("1,254%", "99"),
];

static INDICADORES: Lazy<HashMap<&'static str, &'static str>> =
    Lazy::new(|| INDICADORES_RETEICA.iter().copied().collect());

static NUMEROS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static SUFIJO_IDENTIFICACION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s*(?:NIT\.|C\.C\.)\s*[\d.,\s]+$").unwrap());

/// Indicador de retención para un porcentaje de Reteica (`0,966%`).
pub fn indicador_reteica(porcentaje: &str) -> Option<&'static str> {
    INDICADORES.get(porcentaje.trim()).copied()
}

/// Una fila del consolidado con acceso por fragmentos del encabezado.
struct FilaConsolidado<'a> {
    encabezados: &'a [String],
    celdas: &'a [Data],
}

impl<'a> FilaConsolidado<'a> {
    fn columnas(&self) -> impl Iterator<Item = (String, Option<&'a Data>)> + '_ {
        self.encabezados
            .iter()
            .enumerate()
            .map(move |(i, e)| (e.to_lowercase(), self.celdas.get(i)))
    }

    /// Primera columna que cumple `pred`, tenga o no valor.
    fn primera(&self, pred: impl Fn(&str) -> bool) -> Option<Option<&'a Data>> {
        self.columnas().find(|(e, _)| pred(e)).map(|(_, c)| c)
    }

    /// Primera columna que cumple `pred` y tiene valor.
    fn con_valor(&self, pred: impl Fn(&str) -> bool) -> Option<&'a Data> {
        self.columnas()
            .filter(|(e, _)| pred(e))
            .find_map(|(_, c)| c.filter(|c| !celda_vacia(c)))
    }

    fn texto(&self, pred: impl Fn(&str) -> bool) -> Option<String> {
        self.con_valor(pred).map(|c| texto_celda(c).trim().to_string())
    }
}

fn contiene_alguna(encabezado: &str, palabras: &[&str]) -> bool {
    palabras.iter().any(|p| encabezado.contains(p))
}

fn numero_o_cero(celda: Option<Option<&Data>>) -> Celda {
    match celda.flatten() {
        Some(c) if !celda_vacia(c) => Celda::desde_leida(c),
        _ => Celda::Numero(0.0),
    }
}

/// Conteos de la generación, para el registro de la corrida.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Estadisticas {
    pub pagos: usize,
    pub indicadores_mapeados: usize,
    pub indicadores_usados: BTreeMap<String, usize>,
}

#[derive(Debug, Clone)]
pub struct PlantillaPagos {
    pub filas: Vec<Vec<Celda>>,
    pub estadisticas: Estadisticas,
}

/// Arma las filas C / P40 / P31 de cada pago del consolidado.
pub fn generar(consolidado: &HojaLeida, campos: &CamposPagos, hoy: NaiveDate) -> PlantillaPagos {
    let fecha = hoy.format("%Y%m%d").to_string();
    let col_reteica = consolidado
        .encabezados
        .iter()
        .position(|e| e == "Reteica %")
        .or_else(|| consolidado.columna("reteica"));
    if col_reteica.is_none() {
        warn!("No se encontró columna de Reteica %; se usará el indicador por defecto");
    }

    let mut filas = Vec::with_capacity(consolidado.filas.len() * 3);
    let mut estadisticas = Estadisticas::default();

    for (idx, celdas) in consolidado.filas.iter().enumerate() {
        let pago_num = idx + 1;
        let fila = FilaConsolidado {
            encabezados: &consolidado.encabezados,
            celdas,
        };

        let no_identificacion = fila
            .texto(|e| contiene_alguna(e, &["identific", "nit", "c.c", "documento", "cedula", "id"]))
            .unwrap_or_else(|| format!("ID{:04}", pago_num));

        let valor_bruto = numero_o_cero(fila.primera(|e| e.contains("valor") && e.contains("bruto")));
        let base_retencion = numero_o_cero(
            fila.primera(|e| e.contains("base") && (e.contains("retencion") || e.contains("reteica"))),
        );
        let importe_retencion = numero_o_cero(fila.primera(|e| {
            (e.contains("importe") && (e.contains("retencion") || e.contains("reteica")))
                || (e.contains("reteica") && e.contains("valor"))
        }));

        let rp_doc = fila
            .texto(|e| contiene_alguna(e, &["rp", "doc", "presupuestal"]))
            .unwrap_or_else(|| format!("{}{:02}", campos.prefijo_rp, pago_num));

        let asignacion = fila
            .primera(|e| e.contains("contrato"))
            .flatten()
            .map(|c| asignacion_desde_contrato(&texto_celda(c)))
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| format!("{:03}-{}", pago_num, campos.vigencia_asignacion));

        let codigo_banco = fila
            .texto(|e| (e.contains("código") || e.contains("codigo")) && e.contains("bco"))
            .unwrap_or_else(|| campos.codigo_banco.clone());
        let numero_cuenta = fila
            .texto(|e| e.contains("no") && e.contains("cuenta"))
            .unwrap_or_else(|| campos.numero_cuenta.clone());
        let tipo_cuenta = fila
            .texto(|e| e.contains("tipo") && e.contains("cta"))
            .unwrap_or_else(|| campos.tipo_cuenta.clone());

        let contratista = fila
            .primera(|e| e.contains("contratista"))
            .map(|c| {
                let nombre = c.map(texto_celda).unwrap_or_default();
                let limpio = SUFIJO_IDENTIFICACION.replace(nombre.trim(), "").trim().to_string();
                if limpio.is_empty() {
                    format!("CONTRATISTA {}", pago_num)
                } else {
                    limpio
                }
            })
            .unwrap_or_default();

        let indicador = col_reteica
            .and_then(|i| celdas.get(i))
            .map(texto_celda)
            .and_then(|p| indicador_reteica(&p));
        let indicador = match indicador {
            Some(i) => {
                estadisticas.indicadores_mapeados += 1;
                i.to_string()
            }
            None => {
                debug!("Pago {}: sin indicador para Reteica %, se usa {}", pago_num, campos.indicador_retencion);
                campos.indicador_retencion.clone()
            }
        };
        *estadisticas.indicadores_usados.entry(indicador.clone()).or_insert(0) += 1;

        let texto = format!("10 PAGO {}", asignacion);

        let mut c = fila_vacia();
        c[0] = "C".into();
        c[1] = (pago_num as u64).into();
        c[2] = fecha.as_str().into();
        c[3] = campos.clase_documento.as_str().into();
        c[4] = campos.sociedad.as_str().into();
        c[5] = fecha.as_str().into();
        c[7] = campos.moneda.as_str().into();
        c[9] = asignacion.as_str().into();
        c[10] = contratista.into();

        let mut p40 = fila_vacia();
        p40[0] = "P".into();
        p40[1] = 40u64.into();
        p40[2] = campos.cuenta_gasto.as_str().into();
        p40[7] = valor_bruto.clone();
        p40[8] = campos.indicador_iva.as_str().into();
        p40[9] = rp_doc.into();
        p40[10] = 1u64.into();
        p40[25] = texto.as_str().into();

        let mut p31 = fila_vacia();
        p31[0] = "P".into();
        p31[1] = 31u64.into();
        p31[3] = campos.tipo_identificacion.as_str().into();
        p31[4] = no_identificacion.into();
        p31[6] = campos.cuenta_por_pagar.as_str().into();
        p31[7] = valor_bruto;
        p31[23] = campos.condicion_pago.as_str().into();
        p31[24] = asignacion.into();
        p31[25] = texto.into();
        p31[36] = rellenar_ceros(&codigo_banco, 3).into();
        p31[37] = numero_cuenta.into();
        p31[38] = tipo_cuenta.into();
        p31[39] = indicador.as_str().into();
        p31[40] = indicador.into();
        p31[41] = base_retencion;
        p31[42] = importe_retencion;

        filas.extend([c, p40, p31]);
        estadisticas.pagos += 1;
    }

    info!(
        "Plantilla de pagos: {} pagos, {} filas, {}/{} indicadores mapeados",
        estadisticas.pagos,
        filas.len(),
        estadisticas.indicadores_mapeados,
        estadisticas.pagos
    );
    for (indicador, veces) in &estadisticas.indicadores_usados {
        debug!("Indicador {}: {} veces", indicador, veces);
    }

    PlantillaPagos { filas, estadisticas }
}

fn fila_vacia() -> Vec<Celda> {
    vec![Celda::Vacia; COLUMNAS_PAGOS.len()]
}

/// `CPS 123-2025` → `123-2025`; un solo número queda tal cual.
pub fn asignacion_desde_contrato(contrato: &str) -> String {
    let numeros: Vec<&str> = NUMEROS.find_iter(contrato).map(|m| m.as_str()).collect();
    match numeros.as_slice() {
        [] => String::new(),
        [unico] => unico.to_string(),
        [primero, segundo, ..] => format!("{}-{}", primero, segundo),
    }
}

/// Lee el consolidado de `origen` y genera la plantilla.
pub fn desde_archivo(origen: &Path, campos: &CamposPagos, hoy: NaiveDate) -> Resultado<PlantillaPagos> {
    let consolidado = leer_primera_hoja(origen)?;
    info!(
        "Consolidado {}: {} filas, {} columnas",
        origen.display(),
        consolidado.filas.len(),
        consolidado.encabezados.len()
    );
    Ok(generar(&consolidado, campos, hoy))
}

/// Escribe la hoja `Hoja1` con encabezados en negrita, anchos fijos y datos
/// alineados a la izquierda.
pub fn guardar_libro(destino: &Path, plantilla: &PlantillaPagos) -> Resultado<()> {
    let mut libro = Workbook::new();
    let hoja = libro.add_worksheet();
    hoja.set_name("Hoja1")?;

    let negrita = Format::new().set_bold();
    for (col, encabezado) in COLUMNAS_PAGOS.iter().enumerate() {
        hoja.write_string_with_format(0, col as u16, *encabezado, &negrita)?;
    }

    let izquierda = formato_izquierda();
    for (i, fila) in plantilla.filas.iter().enumerate() {
        for (col, celda) in fila.iter().enumerate() {
            escribir_celda_con_formato(hoja, (i + 1) as u32, col as u16, celda, &izquierda)?;
        }
    }

    for (col, ancho) in ANCHOS_PAGOS.iter().enumerate() {
        hoja.set_column_width(col as u16, *ancho)?;
    }

    libro.save(destino)?;
    info!("Plantilla de pagos guardada: {}", destino.display());
    Ok(())
}
