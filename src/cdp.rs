//! Plantilla de cargue masivo CDP.
//!
//! Un registro por PDF de solicitud, leído del texto por palabras clave:
//! el valor está en la línea siguiente a `VALOR`, el objeto va desde la
//! línea `OBJETO` hasta la próxima `VALOR`, el proyecto es el número de
//! cuatro dígitos de la línea `USME`.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_xlsxwriter::Workbook;
use tracing::info;

use crate::config::CamposCdp;
use crate::error::Resultado;
use crate::libro::{agregar_hoja_celdas, Celda};
use crate::lote::{recorrer, ArchivoFallido, Paso};
use crate::pdf;
use crate::texto::{limpiar_numero, normalizar_texto, rellenar_ceros};

pub const COLUMNAS_CDP: [&str; 20] = [
    "CDP",
    "Posición",
    "Fecha Documento",
    "Fecha Contabilización",
    "Clase Documento",
    "Sociedad",
    "Moneda",
    "importe Original",
    "Posición Presupuestal",
    "Fondos",
    "Elemento PEP",
    "Periodo Presupuestario",
    "Cuenta de Mayor",
    "Objeto",
    "Número Oficio",
    "Fecha Oficio",
    "ID Solicitante",
    "ID Responsable",
    "Num. Ext. Entidad",
    "Archivo",
];

/// Proyecto usado cuando el PDF no trae línea `USME` con número.
const PROYECTO_POR_DEFECTO: &str = "0000";
const OFICIO_NO_ENCONTRADO: &str = "No encontrado";

static NUMERO: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\d.,]+").unwrap());
static PROYECTO: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d{4})\b").unwrap());
static DIGITOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());
static FECHA: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})/(\d{2})/(\d{2})").unwrap());

#[derive(Debug, Clone, PartialEq)]
pub struct RegistroCdp {
    pub archivo: String,
    pub importe: u64,
    pub elemento_pep: String,
    pub objeto: String,
    pub numero_oficio: String,
    /// `dd/mm/aaaa`.
    pub fecha_oficio: String,
    pub proyecto: Option<String>,
}

impl RegistroCdp {
    /// Línea de la hoja de auditoría para este archivo.
    pub fn estado(&self) -> String {
        format!(
            "✔️ Proyecto {} → {}, Valor {}",
            self.proyecto.as_deref().unwrap_or("NO"),
            self.elemento_pep,
            self.importe
        )
    }
}

/// `PM/0005/0101/4599000` seguido del número de proyecto en cinco dígitos.
pub fn convertir_pep(numero: &str) -> String {
    format!("PM/0005/0101/4599000{}", rellenar_ceros(numero, 5))
}

/// Extrae el registro de las líneas de texto de un PDF.
///
/// Para cada campo vale la primera coincidencia; si no hay ninguna queda el
/// valor por defecto (0, vacío, `No encontrado` o la fecha `hoy`).
pub fn extraer_cdp(lineas: &[String], archivo: &str, hoy: NaiveDate) -> RegistroCdp {
    let mut valor: Option<u64> = None;
    let mut objeto: Option<String> = None;
    let mut proyecto: Option<String> = None;
    let mut oficio: Option<String> = None;
    let mut fecha: Option<String> = None;

    let es_valor = |l: &str| l.to_uppercase().contains("VALOR");

    for (idx, linea) in lineas.iter().enumerate() {
        let upper = linea.to_uppercase();

        if valor.is_none() && upper.contains("VALOR") {
            valor = lineas
                .get(idx + 1)
                .and_then(|siguiente| NUMERO.find(siguiente))
                .map(|m| limpiar_numero(m.as_str()));
        }

        if objeto.is_none() && upper.contains("OBJETO") {
            let partes: Vec<&str> = lineas[idx + 1..]
                .iter()
                .map(String::as_str)
                .take_while(|l| !es_valor(*l))
                .collect();
            objeto = Some(normalizar_texto(&partes.join(" ")));
        }

        if proyecto.is_none() && upper.contains("USME") {
            proyecto = PROYECTO.captures(linea).map(|c| c[1].to_string());
        }

        if oficio.is_none()
            && (upper.contains("SOLICITUD NO") || upper.contains("SOLICITUD N°") || upper.contains("SOLICITUD Nº"))
        {
            oficio = DIGITOS.find(linea).map(|m| m.as_str().to_string());
        }

        if fecha.is_none() && upper.contains("CDP DE FECHA") {
            fecha = FECHA
                .captures(linea)
                .map(|c| format!("{}/{}/{}", &c[3], &c[2], &c[1]));
        }
    }

    let elemento_pep = convertir_pep(proyecto.as_deref().unwrap_or(PROYECTO_POR_DEFECTO));

    RegistroCdp {
        archivo: archivo.to_string(),
        importe: valor.unwrap_or(0),
        elemento_pep,
        objeto: objeto.unwrap_or_default(),
        numero_oficio: oficio.unwrap_or_else(|| OFICIO_NO_ENCONTRADO.to_string()),
        fecha_oficio: fecha.unwrap_or_else(|| hoy.format("%d/%m/%Y").to_string()),
        proyecto,
    }
}

/// Filas de la hoja `Plantilla_CDP`, numeradas desde 1.
pub fn filas_plantilla(registros: &[RegistroCdp], campos: &CamposCdp, hoy: NaiveDate) -> Vec<Vec<Celda>> {
    let fecha = hoy.format("%d.%m.%Y").to_string();
    registros
        .iter()
        .enumerate()
        .map(|(i, r)| {
            let consecutivo = (i + 1) as u64;
            vec![
                consecutivo.into(),
                campos.posicion.as_str().into(),
                fecha.as_str().into(),
                fecha.as_str().into(),
                campos.clase_documento.as_str().into(),
                campos.sociedad.as_str().into(),
                campos.moneda.as_str().into(),
                r.importe.into(),
                campos.posicion_presupuestal.as_str().into(),
                campos.fondos.as_str().into(),
                r.elemento_pep.as_str().into(),
                campos.periodo_presupuestario.as_str().into(),
                campos.cuenta_mayor.as_str().into(),
                r.objeto.as_str().into(),
                r.numero_oficio.as_str().into(),
                r.fecha_oficio.as_str().into(),
                campos.id_solicitante.as_str().into(),
                campos.id_responsable.as_str().into(),
                consecutivo.into(),
                r.archivo.as_str().into(),
            ]
        })
        .collect()
}

/// Resultado de un lote CDP, con las líneas de la hoja de auditoría.
#[derive(Debug, Default)]
pub struct LoteCdp {
    pub registros: Vec<RegistroCdp>,
    pub fallidos: Vec<ArchivoFallido>,
    /// `(archivo, estado)` en el orden de entrada.
    pub bitacora: Vec<(String, String)>,
    pub total_pdfs: usize,
}

pub fn procesar_archivos(rutas: &[PathBuf], hoy: NaiveDate) -> LoteCdp {
    let recorrido = recorrer(rutas, |archivo, bytes| {
        let doc = pdf::cargar(bytes)?;
        Ok(extraer_cdp(&pdf::lineas(&doc), archivo, hoy))
    });

    let mut lote = LoteCdp {
        total_pdfs: rutas.len(),
        ..LoteCdp::default()
    };
    for paso in &recorrido.orden {
        let linea = match *paso {
            Paso::Procesado(i) => {
                let (archivo, registro) = &recorrido.procesados[i];
                info!("Procesado PDF: {}", archivo);
                (archivo.clone(), registro.estado())
            }
            Paso::Fallido(i) => {
                let fallido = &recorrido.fallidos[i];
                (fallido.archivo.clone(), format!("❌ Error abriendo PDF: {}", fallido.motivo))
            }
        };
        lote.bitacora.push(linea);
    }
    lote.registros = recorrido.procesados.into_iter().map(|(_, r)| r).collect();
    lote.fallidos = recorrido.fallidos;
    lote
}

/// Filas de `Log_Auditoría`: estado por archivo, una fila en blanco y los
/// totales del lote.
pub fn filas_auditoria(lote: &LoteCdp) -> Vec<Vec<Celda>> {
    let mut filas: Vec<Vec<Celda>> = lote
        .bitacora
        .iter()
        .map(|(archivo, estado)| vec![archivo.as_str().into(), estado.as_str().into()])
        .collect();
    filas.push(Vec::new());
    filas.push(vec!["Total PDFs procesados".into(), (lote.total_pdfs as u64).into()]);
    filas.push(vec!["Registros exportados".into(), (lote.registros.len() as u64).into()]);
    filas
}

/// Escribe `Plantilla_CDP` y `Log_Auditoría` en `destino`.
pub fn guardar_libro(destino: &Path, lote: &LoteCdp, campos: &CamposCdp, hoy: NaiveDate) -> Resultado<()> {
    let mut libro = Workbook::new();
    agregar_hoja_celdas(
        &mut libro,
        "Plantilla_CDP",
        &COLUMNAS_CDP,
        &filas_plantilla(&lote.registros, campos, hoy),
    )?;
    agregar_hoja_celdas(&mut libro, "Log_Auditoría", &["Archivo", "Estado"], &filas_auditoria(lote))?;
    libro.save(destino)?;
    info!("Plantilla guardada: {}", destino.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineas(texto: &str) -> Vec<String> {
        texto.lines().map(str::to_string).collect()
    }

    fn hoy() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 1, 29).unwrap()
    }

    #[test]
    fn extrae_campos_por_palabra_clave() {
        let texto = lineas(
            "SOLICITUD No. 2026-0345\n\
             FONDO DE DESARROLLO LOCAL DE USME\n\
             PROYECTO 2145 USME MEJOR PARA TODOS\n\
             OBJETO\n\
             Prestar servicios profesionales   para\n\
             apoyar la gestión local\n\
             VALOR\n\
             $ 12.500.000\n\
             Se expide CDP DE FECHA 2026/01/15",
        );
        let r = extraer_cdp(&texto, "sol.pdf", hoy());

        assert_eq!(r.importe, 12_500_000);
        assert_eq!(r.objeto, "Prestar servicios profesionales para apoyar la gestión local");
        assert_eq!(r.proyecto.as_deref(), Some("2145"));
        assert_eq!(r.elemento_pep, "PM/0005/0101/459900002145");
        assert_eq!(r.numero_oficio, "2026");
        assert_eq!(r.fecha_oficio, "15/01/2026");
        assert_eq!(r.estado(), "✔️ Proyecto 2145 → PM/0005/0101/459900002145, Valor 12500000");
    }

    #[test]
    fn sin_coincidencias_usa_valores_por_defecto() {
        let r = extraer_cdp(&lineas("documento sin campos"), "x.pdf", hoy());
        assert_eq!(r.importe, 0);
        assert_eq!(r.objeto, "");
        assert_eq!(r.proyecto, None);
        assert_eq!(r.elemento_pep, "PM/0005/0101/459900000000");
        assert_eq!(r.numero_oficio, "No encontrado");
        assert_eq!(r.fecha_oficio, "29/01/2026");
        assert!(r.estado().contains("Proyecto NO"));
    }

    #[test]
    fn primera_coincidencia_gana() {
        let texto = lineas("VALOR\n1.000\nVALOR TOTAL\n9.999.999");
        assert_eq!(extraer_cdp(&texto, "x.pdf", hoy()).importe, 1_000);
    }

    #[test]
    fn valor_en_la_ultima_linea_no_falla() {
        let texto = lineas("OBJETO\nalgo\nVALOR");
        let r = extraer_cdp(&texto, "x.pdf", hoy());
        assert_eq!(r.importe, 0);
        assert_eq!(r.objeto, "algo");
    }

    #[test]
    fn pep_rellena_a_cinco_digitos() {
        assert_eq!(convertir_pep("2145"), "PM/0005/0101/459900002145");
        assert_eq!(convertir_pep("7"), "PM/0005/0101/459900000007");
    }

    #[test]
    fn plantilla_cdp_con_fijos() {
        let r = extraer_cdp(&lineas("VALOR\n2.000"), "a.pdf", hoy());
        let filas = filas_plantilla(&[r], &CamposCdp::default(), hoy());
        assert_eq!(filas[0].len(), COLUMNAS_CDP.len());
        assert_eq!(filas[0][0], Celda::Numero(1.0));
        assert_eq!(filas[0][2], Celda::texto("29.01.2026"));
        assert_eq!(filas[0][4], Celda::texto("CP"));
        assert_eq!(filas[0][7], Celda::Numero(2000.0));
        assert_eq!(filas[0][9], Celda::texto("1-100-I079"));
        assert_eq!(filas[0][19], Celda::texto("a.pdf"));
    }

    #[test]
    fn auditoria_con_totales() {
        let lote = LoteCdp {
            registros: vec![extraer_cdp(&lineas("VALOR\n2.000"), "a.pdf", hoy())],
            fallidos: vec![ArchivoFallido {
                archivo: "b.pdf".into(),
                motivo: "dañado".into(),
            }],
            bitacora: vec![
                ("a.pdf".into(), "✔️ Proyecto NO → PM/0005/0101/459900000000, Valor 2000".into()),
                ("b.pdf".into(), "❌ Error abriendo PDF: dañado".into()),
            ],
            total_pdfs: 2,
        };
        let filas = filas_auditoria(&lote);
        assert_eq!(filas.len(), 5);
        assert!(filas[2].is_empty());
        assert_eq!(filas[3], vec![Celda::texto("Total PDFs procesados"), Celda::Numero(2.0)]);
        assert_eq!(filas[4], vec![Celda::texto("Registros exportados"), Celda::Numero(1.0)]);
    }
}
