//! Ingreso, cierre y verificación de sesión con registro en la bitácora.

use tracing::warn;

use crate::auditoria::{Bitacora, Nivel};
use crate::config::Config;
use crate::error::{Error, Resultado};
use crate::seguridad::{EstadoAcceso, Sesion};
use crate::usuarios::{normalizar, AlmacenUsuarios, Permiso, Rol};

pub struct ControlAcceso<'a> {
    config: &'a Config,
    bitacora: &'a Bitacora,
}

impl<'a> ControlAcceso<'a> {
    pub fn new(config: &'a Config, bitacora: &'a Bitacora) -> Self {
        Self { config, bitacora }
    }

    pub fn almacen(&self) -> Resultado<AlmacenUsuarios> {
        AlmacenUsuarios::abrir(&self.config.rutas.usuarios(), self.config.acceso.iteraciones_hash)
    }

    fn cargar_estado(&self) -> Resultado<EstadoAcceso> {
        EstadoAcceso::cargar(&self.config.rutas.estado_acceso())
    }

    fn guardar_estado(&self, estado: &EstadoAcceso) -> Resultado<()> {
        estado.guardar(&self.config.rutas.estado_acceso())
    }

    /// Valida las credenciales y abre la sesión.
    ///
    /// Cada fallo cuenta para el bloqueo; el fallo que lo activa deja una
    /// alerta `WARNING` en la bitácora.
    pub fn ingresar(&self, usuario: &str, clave: &str, ahora: i64) -> Resultado<Rol> {
        let politica = &self.config.acceso;
        let mut estado = self.cargar_estado()?;
        if let Some(restante) = estado.bloqueo_restante(ahora) {
            return Err(Error::Bloqueado { restante });
        }

        let usuario = normalizar(usuario);
        match self.almacen()?.autenticar(&usuario, clave) {
            Some(rol) => {
                estado.iniciar_sesion(&usuario, rol, ahora);
                self.guardar_estado(&estado)?;
                self.bitacora
                    .registrar(&format!("Login exitoso: {} (role={})", usuario, rol))?;
                Ok(rol)
            }
            None => {
                self.bitacora.registrar(&format!("Login fallido: {}", usuario))?;
                let bloqueado = estado.registrar_fallo(politica, ahora);
                self.guardar_estado(&estado)?;
                if bloqueado {
                    warn!("Bloqueo temporal para {}", usuario);
                    self.bitacora.alerta(
                        &format!("Bloqueo temporal por intentos fallidos. Usuario={}", usuario),
                        Nivel::Warning,
                    )?;
                    return Err(Error::Bloqueado {
                        restante: politica.bloqueo_segundos,
                    });
                }
                Err(Error::CredencialesInvalidas)
            }
        }
    }

    /// Cierra la sesión activa, si la hay.
    pub fn salir(&self) -> Resultado<Option<String>> {
        let mut estado = self.cargar_estado()?;
        let usuario = estado.cerrar_sesion();
        self.guardar_estado(&estado)?;
        if let Some(u) = &usuario {
            self.bitacora.registrar(&format!("Logout: {}", u))?;
        }
        Ok(usuario)
    }

    /// Sesión vigente con permiso para `permiso`; renueva la actividad.
    pub fn exigir(&self, permiso: Permiso, ahora: i64) -> Resultado<Sesion> {
        let mut estado = self.cargar_estado()?;
        let resultado = estado
            .sesion_activa(&self.config.acceso, ahora)
            .map(Clone::clone);
        self.guardar_estado(&estado)?;

        let sesion = match resultado {
            Ok(s) => s,
            Err(Error::SesionExpirada { usuario }) => {
                self.bitacora
                    .registrar(&format!("Sesión expirada por inactividad: {}", usuario))?;
                return Err(Error::SesionExpirada { usuario });
            }
            Err(e) => return Err(e),
        };

        if let Err(e) = sesion.rol.exigir(permiso) {
            self.bitacora
                .registrar(&format!("Acceso denegado: {} ({}) {:?}", sesion.usuario, sesion.rol, permiso))?;
            return Err(e);
        }
        Ok(sesion)
    }

    /// Estado actual, descartando la sesión si ya expiró.
    pub fn estado(&self, ahora: i64) -> Resultado<EstadoAcceso> {
        let mut estado = self.cargar_estado()?;
        if let Err(Error::SesionExpirada { usuario }) = estado.verificar_acceso(&self.config.acceso, ahora) {
            self.guardar_estado(&estado)?;
            self.bitacora
                .registrar(&format!("Sesión expirada por inactividad: {}", usuario))?;
        }
        Ok(estado)
    }
}
