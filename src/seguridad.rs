//! Hash de claves y estado de acceso entre invocaciones.
//!
//! El programa no mantiene un proceso vivo, así que los intentos fallidos, el
//! bloqueo temporal y la sesión activa se guardan en `acceso.json`. Los
//! instantes son segundos Unix.

use std::num::NonZeroU32;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ring::pbkdf2;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::PoliticaAcceso;
use crate::error::{Error, Resultado};
use crate::usuarios::Rol;

pub const ALGORITMO: &str = "pbkdf2_sha256";
const LARGO_SAL: usize = 16;
const LARGO_HASH: usize = 32;

/// Clave derivada tal como se guarda en `users.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashClave {
    pub salt: String,
    pub hash: String,
    pub iters: u32,
    pub algo: String,
}

fn iteraciones(n: u32) -> NonZeroU32 {
    NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN)
}

/// Deriva la clave con PBKDF2-HMAC-SHA256 y una sal aleatoria de 16 bytes.
pub fn hash_password(clave: &str, iters: u32) -> HashClave {
    let sal: [u8; LARGO_SAL] = rand::random();
    let mut derivada = [0u8; LARGO_HASH];
    pbkdf2::derive(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iteraciones(iters),
        &sal,
        clave.as_bytes(),
        &mut derivada,
    );
    HashClave {
        salt: STANDARD.encode(sal),
        hash: STANDARD.encode(derivada),
        iters: iteraciones(iters).get(),
        algo: ALGORITMO.to_string(),
    }
}

/// Compara en tiempo constante. Un registro dañado nunca verifica.
pub fn verificar(clave: &str, guardado: &HashClave) -> bool {
    if guardado.algo != ALGORITMO {
        return false;
    }
    let (Ok(sal), Ok(hash)) = (STANDARD.decode(&guardado.salt), STANDARD.decode(&guardado.hash)) else {
        return false;
    };
    pbkdf2::verify(
        pbkdf2::PBKDF2_HMAC_SHA256,
        iteraciones(guardado.iters),
        &sal,
        clave.as_bytes(),
        &hash,
    )
    .is_ok()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sesion {
    pub usuario: String,
    pub rol: Rol,
    pub ultima_actividad: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstadoAcceso {
    pub intentos: u32,
    pub bloqueado_hasta: Option<i64>,
    pub sesion: Option<Sesion>,
}

impl EstadoAcceso {
    /// Estado guardado en `ruta`; vacío si no existe o está dañado.
    pub fn cargar(ruta: &Path) -> Resultado<Self> {
        if !ruta.exists() {
            return Ok(Self::default());
        }
        let contenido = std::fs::read_to_string(ruta)?;
        match serde_json::from_str(&contenido) {
            Ok(estado) => Ok(estado),
            Err(e) => {
                warn!("Estado de acceso dañado ({}), se reinicia", e);
                Ok(Self::default())
            }
        }
    }

    pub fn guardar(&self, ruta: &Path) -> Resultado<()> {
        if let Some(dir) = ruta.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(ruta, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Segundos de bloqueo que quedan, si la cuenta está bloqueada.
    pub fn bloqueo_restante(&self, ahora: i64) -> Option<i64> {
        self.bloqueado_hasta.filter(|&hasta| ahora < hasta).map(|hasta| hasta - ahora)
    }

    /// Descarta la sesión inactiva por más de `inactividad_segundos`. El
    /// bloqueo y los intentos se conservan; solo frenan nuevos ingresos.
    pub fn verificar_acceso(&mut self, politica: &PoliticaAcceso, ahora: i64) -> Resultado<()> {
        let expirada = self
            .sesion
            .as_ref()
            .filter(|s| ahora - s.ultima_actividad > politica.inactividad_segundos)
            .map(|s| s.usuario.clone());
        if let Some(usuario) = expirada {
            self.sesion = None;
            return Err(Error::SesionExpirada { usuario });
        }
        Ok(())
    }

    /// Cuenta un intento fallido. Devuelve `true` cuando el intento activa
    /// el bloqueo; en ese caso el contador vuelve a cero.
    pub fn registrar_fallo(&mut self, politica: &PoliticaAcceso, ahora: i64) -> bool {
        self.intentos += 1;
        if self.intentos >= politica.max_intentos {
            self.bloqueado_hasta = Some(ahora + politica.bloqueo_segundos);
            self.intentos = 0;
            return true;
        }
        false
    }

    pub fn intentos_restantes(&self, politica: &PoliticaAcceso) -> u32 {
        politica.max_intentos.saturating_sub(self.intentos)
    }

    pub fn iniciar_sesion(&mut self, usuario: &str, rol: Rol, ahora: i64) {
        self.intentos = 0;
        self.sesion = Some(Sesion {
            usuario: usuario.to_string(),
            rol,
            ultima_actividad: ahora,
        });
    }

    /// Cierra la sesión y devuelve el usuario que la tenía.
    pub fn cerrar_sesion(&mut self) -> Option<String> {
        let usuario = self.sesion.take().map(|s| s.usuario);
        *self = Self::default();
        usuario
    }

    /// Sesión vigente con la actividad renovada.
    pub fn sesion_activa(&mut self, politica: &PoliticaAcceso, ahora: i64) -> Resultado<&Sesion> {
        self.verificar_acceso(politica, ahora)?;
        match self.sesion.as_mut() {
            Some(sesion) => {
                sesion.ultima_actividad = ahora;
                Ok(sesion)
            }
            None => Err(Error::SinSesion),
        }
    }

    pub fn sesion_restante(&self, politica: &PoliticaAcceso, ahora: i64) -> Option<i64> {
        self.sesion
            .as_ref()
            .map(|s| politica.inactividad_segundos - (ahora - s.ultima_actividad))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn politica() -> PoliticaAcceso {
        PoliticaAcceso {
            iteraciones_hash: 1_000,
            ..PoliticaAcceso::default()
        }
    }

    #[test]
    fn verifica_clave_correcta_e_incorrecta() {
        let h = hash_password("admin123", 1_000);
        assert_eq!(h.algo, ALGORITMO);
        assert!(verificar("admin123", &h));
        assert!(!verificar("admin124", &h));
        assert_ne!(h.salt, hash_password("admin123", 1_000).salt);
    }

    #[test]
    fn hash_danado_no_verifica() {
        let mut h = hash_password("x", 1_000);
        h.salt = "%%%".to_string();
        assert!(!verificar("x", &h));
    }

    #[test]
    fn bloquea_al_quinto_fallo() {
        let p = politica();
        let mut estado = EstadoAcceso::default();
        for _ in 0..4 {
            assert!(!estado.registrar_fallo(&p, 100));
        }
        assert_eq!(estado.intentos_restantes(&p), 1);
        assert!(estado.registrar_fallo(&p, 100));
        assert_eq!(estado.intentos, 0);

        assert_eq!(estado.bloqueo_restante(130), Some(30));
        assert_eq!(estado.bloqueo_restante(160), None);
    }

    #[test]
    fn bloqueo_no_afecta_sesion_abierta() {
        let p = politica();
        let mut estado = EstadoAcceso::default();
        estado.iniciar_sesion("usuario", Rol::Usuario, 100);
        for _ in 0..5 {
            estado.registrar_fallo(&p, 110);
        }
        assert_eq!(estado.bloqueo_restante(120), Some(50));
        assert_eq!(estado.sesion_activa(&p, 120).unwrap().usuario, "usuario");
    }

    #[test]
    fn expirar_la_sesion_conserva_el_bloqueo() {
        let p = PoliticaAcceso {
            inactividad_segundos: 30,
            ..politica()
        };
        let mut estado = EstadoAcceso::default();
        estado.iniciar_sesion("usuario", Rol::Usuario, 100);
        for _ in 0..5 {
            estado.registrar_fallo(&p, 110);
        }

        assert!(matches!(
            estado.sesion_activa(&p, 140),
            Err(Error::SesionExpirada { .. })
        ));
        assert_eq!(estado.sesion, None);
        assert_eq!(estado.bloqueo_restante(140), Some(30));
    }

    #[test]
    fn sesion_expira_por_inactividad() {
        let p = politica();
        let mut estado = EstadoAcceso::default();
        estado.iniciar_sesion("admin", Rol::Admin, 0);

        assert!(estado.sesion_activa(&p, 1_000).is_ok());
        assert_eq!(estado.sesion_restante(&p, 1_000), Some(1_200));

        match estado.sesion_activa(&p, 1_000 + 1_201) {
            Err(Error::SesionExpirada { usuario }) => assert_eq!(usuario, "admin"),
            otro => panic!("se esperaba expiración, hubo {:?}", otro),
        }
        assert_eq!(estado, EstadoAcceso::default());
    }

    #[test]
    fn estado_se_guarda_y_se_recupera() {
        let dir = tempfile::tempdir().unwrap();
        let ruta = dir.path().join("data").join("acceso.json");
        let mut estado = EstadoAcceso::default();
        estado.iniciar_sesion("auditor", Rol::Auditor, 42);
        estado.guardar(&ruta).unwrap();
        assert_eq!(EstadoAcceso::cargar(&ruta).unwrap(), estado);

        std::fs::write(&ruta, "{ dañado").unwrap();
        assert_eq!(EstadoAcceso::cargar(&ruta).unwrap(), EstadoAcceso::default());
    }
}
