//! Configuración del programa.
//!
//! Todo campo tiene valor por defecto; `planillas.toml` solo necesita lo que
//! cambie respecto de la operación normal de la alcaldía.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Resultado;

/// Nombre del archivo de configuración buscado en el directorio actual.
pub const ARCHIVO_CONFIG: &str = "planillas.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub rutas: Rutas,
    pub acceso: PoliticaAcceso,
    /// Registrar una alerta por cada error de procesamiento.
    pub alertas_automaticas: bool,
    pub crp: CamposCrp,
    pub cdp: CamposCdp,
    pub pagos: CamposPagos,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rutas: Rutas::default(),
            acceso: PoliticaAcceso::default(),
            alertas_automaticas: false,
            crp: CamposCrp::default(),
            cdp: CamposCdp::default(),
            pagos: CamposPagos::default(),
        }
    }
}

impl Config {
    /// Lee `ruta`; si es `None` usa `planillas.toml` cuando existe.
    pub fn cargar(ruta: Option<&Path>) -> Resultado<Self> {
        let ruta = match ruta {
            Some(r) => r.to_path_buf(),
            None => {
                let por_defecto = PathBuf::from(ARCHIVO_CONFIG);
                if !por_defecto.exists() {
                    return Ok(Self::default());
                }
                por_defecto
            }
        };
        let contenido = std::fs::read_to_string(&ruta)?;
        Self::desde_toml(&contenido)
    }

    pub fn desde_toml(contenido: &str) -> Resultado<Self> {
        Ok(toml::from_str(contenido)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Rutas {
    pub salidas: PathBuf,
    pub logs: PathBuf,
    pub datos: PathBuf,
}

impl Default for Rutas {
    fn default() -> Self {
        Self {
            salidas: PathBuf::from("salidas"),
            logs: PathBuf::from("logs"),
            datos: PathBuf::from("data"),
        }
    }
}

impl Rutas {
    pub fn usuarios(&self) -> PathBuf {
        self.datos.join("users.json")
    }

    pub fn estado_acceso(&self) -> PathBuf {
        self.datos.join("acceso.json")
    }

    pub fn crear_directorios(&self) -> Resultado<()> {
        std::fs::create_dir_all(&self.salidas)?;
        std::fs::create_dir_all(&self.logs)?;
        std::fs::create_dir_all(&self.datos)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoliticaAcceso {
    pub max_intentos: u32,
    pub bloqueo_segundos: i64,
    pub inactividad_segundos: i64,
    pub iteraciones_hash: u32,
    pub codigo_reset: String,
}

impl Default for PoliticaAcceso {
    fn default() -> Self {
        Self {
            max_intentos: 5,
            bloqueo_segundos: 60,
            inactividad_segundos: 20 * 60,
            iteraciones_hash: 210_000,
            codigo_reset: "RESET-USME-2026".to_string(),
        }
    }
}

/// Campos constantes de la plantilla de cargue masivo CRP.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CamposCrp {
    pub posicion: String,
    pub sociedad: String,
    pub clase_documento: String,
    pub moneda: String,
    pub fecha_final: String,
    pub tipo_pago: String,
    pub modo_seleccion: String,
    pub tipo_documento_beneficiario: String,
    pub id_solicitante: String,
    pub id_responsable: String,
}

impl Default for CamposCrp {
    fn default() -> Self {
        Self {
            posicion: "1".to_string(),
            sociedad: "1001".to_string(),
            clase_documento: "RP".to_string(),
            moneda: "COP".to_string(),
            fecha_final: "31.12.2026".to_string(),
            tipo_pago: "02".to_string(),
            modo_seleccion: "10".to_string(),
            tipo_documento_beneficiario: "CC".to_string(),
            id_solicitante: "1000131265".to_string(),
            id_responsable: "1000835316".to_string(),
        }
    }
}

/// Campos constantes de la plantilla de cargue masivo CDP.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CamposCdp {
    pub posicion: String,
    pub clase_documento: String,
    pub sociedad: String,
    pub moneda: String,
    pub posicion_presupuestal: String,
    pub fondos: String,
    pub periodo_presupuestario: String,
    pub cuenta_mayor: String,
    pub id_solicitante: String,
    pub id_responsable: String,
}

impl Default for CamposCdp {
    fn default() -> Self {
        Self {
            posicion: "1".to_string(),
            clase_documento: "CP".to_string(),
            sociedad: "1001".to_string(),
            moneda: "COP".to_string(),
            posicion_presupuestal: "10".to_string(),
            fondos: "1-100-I079".to_string(),
            periodo_presupuestario: "2026".to_string(),
            cuenta_mayor: "7990990000".to_string(),
            id_solicitante: "1000131265".to_string(),
            id_responsable: "1000835316".to_string(),
        }
    }
}

/// Valores fijos y de respaldo de la plantilla de pagos (filas C / P40 / P31).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CamposPagos {
    pub clase_documento: String,
    pub sociedad: String,
    pub moneda: String,
    pub cuenta_gasto: String,
    pub indicador_iva: String,
    pub cuenta_por_pagar: String,
    pub condicion_pago: String,
    pub tipo_identificacion: String,
    pub prefijo_rp: String,
    pub vigencia_asignacion: String,
    pub codigo_banco: String,
    pub numero_cuenta: String,
    pub tipo_cuenta: String,
    pub indicador_retencion: String,
}

impl Default for CamposPagos {
    fn default() -> Self {
        Self {
            clase_documento: "KR".to_string(),
            sociedad: "1001".to_string(),
            moneda: "COP".to_string(),
            cuenta_gasto: "5111809000".to_string(),
            indicador_iva: "WB".to_string(),
            cuenta_por_pagar: "2401010100".to_string(),
            condicion_pago: "0051".to_string(),
            tipo_identificacion: "CC".to_string(),
            prefijo_rp: "50009973".to_string(),
            vigencia_asignacion: "2025".to_string(),
            codigo_banco: "051".to_string(),
            numero_cuenta: "0550488435468647".to_string(),
            tipo_cuenta: "02".to_string(),
            indicador_retencion: "39".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toml_parcial_conserva_valores_por_defecto() {
        let config = Config::desde_toml(
            r#"
            alertas_automaticas = true

            [acceso]
            max_intentos = 3

            [crp]
            fecha_final = "31.12.2027"
            "#,
        )
        .unwrap();

        assert!(config.alertas_automaticas);
        assert_eq!(config.acceso.max_intentos, 3);
        assert_eq!(config.acceso.bloqueo_segundos, 60);
        assert_eq!(config.crp.fecha_final, "31.12.2027");
        assert_eq!(config.crp.sociedad, "1001");
        assert_eq!(config.cdp.fondos, "1-100-I079");
        assert_eq!(config.rutas.logs, PathBuf::from("logs"));
    }

    #[test]
    fn toml_invalido_es_error() {
        assert!(Config::desde_toml("acceso = 3").is_err());
    }
}
