//! Usuarios, roles y el almacén `users.json`.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Resultado};
use crate::libro::{leer_primera_hoja, texto_celda};
use crate::seguridad::{hash_password, verificar, HashClave};

/// Usuarios sembrados cuando el almacén no existe o se restablece.
const USUARIOS_POR_DEFECTO: [(&str, &str, Rol); 3] = [
    ("admin", "admin123", Rol::Admin),
    ("auditor", "audit456", Rol::Auditor),
    ("usuario", "user789", Rol::Usuario),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Rol {
    Admin,
    Auditor,
    Usuario,
}

/// Acciones sujetas a rol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permiso {
    Procesar,
    VerAuditoria,
    DescargarAuditoria,
    Administrar,
}

impl Permiso {
    fn accion(self) -> &'static str {
        match self {
            Permiso::Procesar => "procesar archivos",
            Permiso::VerAuditoria => "ver la auditoría",
            Permiso::DescargarAuditoria => "descargar la auditoría",
            Permiso::Administrar => "administrar usuarios",
        }
    }
}

impl Rol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rol::Admin => "admin",
            Rol::Auditor => "auditor",
            Rol::Usuario => "usuario",
        }
    }

    pub fn desde_texto(texto: &str) -> Option<Self> {
        match texto.trim().to_lowercase().as_str() {
            "admin" => Some(Rol::Admin),
            "auditor" => Some(Rol::Auditor),
            "usuario" => Some(Rol::Usuario),
            _ => None,
        }
    }

    pub fn permite(&self, permiso: Permiso) -> bool {
        match permiso {
            Permiso::Procesar => matches!(self, Rol::Admin | Rol::Usuario),
            Permiso::VerAuditoria => true,
            Permiso::DescargarAuditoria => matches!(self, Rol::Admin | Rol::Auditor),
            Permiso::Administrar => matches!(self, Rol::Admin),
        }
    }

    pub fn exigir(&self, permiso: Permiso) -> Resultado<()> {
        if self.permite(permiso) {
            Ok(())
        } else {
            Err(Error::PermisoDenegado {
                rol: self.as_str().to_string(),
                accion: permiso.accion(),
            })
        }
    }
}

impl fmt::Display for Rol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistroUsuario {
    #[serde(rename = "role")]
    pub rol: Rol,
    #[serde(flatten)]
    pub clave: HashClave,
}

/// Nombres de usuario sin espacios alrededor y en minúsculas.
pub fn normalizar(usuario: &str) -> String {
    usuario.trim().to_lowercase()
}

pub struct AlmacenUsuarios {
    ruta: PathBuf,
    iteraciones: u32,
    usuarios: BTreeMap<String, RegistroUsuario>,
}

impl AlmacenUsuarios {
    /// Abre el almacén en `ruta`. Si no existe se siembra con los usuarios
    /// por defecto; si está dañado se regenera.
    pub fn abrir(ruta: &Path, iteraciones: u32) -> Resultado<Self> {
        let mut almacen = Self {
            ruta: ruta.to_path_buf(),
            iteraciones,
            usuarios: BTreeMap::new(),
        };

        if !ruta.exists() {
            info!("Creando almacén de usuarios en {}", ruta.display());
            almacen.sembrar()?;
            return Ok(almacen);
        }

        let contenido = std::fs::read_to_string(ruta)?;
        match serde_json::from_str(&contenido) {
            Ok(usuarios) => almacen.usuarios = usuarios,
            Err(e) => {
                warn!("users.json dañado ({}), se regenera con los usuarios por defecto", e);
                almacen.sembrar()?;
            }
        }
        Ok(almacen)
    }

    fn sembrar(&mut self) -> Resultado<()> {
        self.usuarios = USUARIOS_POR_DEFECTO
            .iter()
            .map(|(usuario, clave, rol)| {
                let registro = RegistroUsuario {
                    rol: *rol,
                    clave: hash_password(clave, self.iteraciones),
                };
                (usuario.to_string(), registro)
            })
            .collect();
        self.guardar()
    }

    fn guardar(&self) -> Resultado<()> {
        if let Some(dir) = self.ruta.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.ruta, serde_json::to_string_pretty(&self.usuarios)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.usuarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.usuarios.is_empty()
    }

    pub fn rol(&self, usuario: &str) -> Option<Rol> {
        self.usuarios.get(&normalizar(usuario)).map(|r| r.rol)
    }

    /// Rol del usuario si la clave es correcta.
    pub fn autenticar(&self, usuario: &str, clave: &str) -> Option<Rol> {
        self.usuarios
            .get(&normalizar(usuario))
            .filter(|r| verificar(clave, &r.clave))
            .map(|r| r.rol)
    }

    /// Crea el usuario o reemplaza su clave y rol.
    pub fn upsert(&mut self, usuario: &str, clave: &str, rol: Rol) -> Resultado<()> {
        let usuario = normalizar(usuario);
        if usuario.is_empty() || clave.is_empty() {
            return Err(Error::Datos("usuario y clave son obligatorios".into()));
        }
        let registro = RegistroUsuario {
            rol,
            clave: hash_password(clave, self.iteraciones),
        };
        self.usuarios.insert(usuario, registro);
        self.guardar()
    }

    /// Vuelve a los usuarios por defecto si `codigo` coincide con `esperado`.
    pub fn restablecer(&mut self, codigo: &str, esperado: &str) -> Resultado<()> {
        if codigo.trim() != esperado {
            return Err(Error::CodigoResetIncorrecto);
        }
        self.sembrar()
    }

    /// Carga usuarios desde un CSV o un libro de Excel con columnas de
    /// usuario y clave (y opcionalmente rol). Devuelve cuántos se cargaron.
    pub fn importar(&mut self, ruta: &Path) -> Resultado<usize> {
        let (encabezados, filas) = leer_tabla_credenciales(ruta)?;
        let columnas: Vec<String> = encabezados.iter().map(|e| e.to_lowercase()).collect();
        let buscar = |palabras: &[&str]| columnas.iter().rposition(|c| palabras.iter().any(|p| c.contains(p)));

        let col_usuario = buscar(&["user", "usuario", "login"]);
        let col_clave = buscar(&["pass", "clave", "password"]);
        let col_rol = buscar(&["rol", "role"]);

        let (Some(col_usuario), Some(col_clave)) = (col_usuario, col_clave) else {
            let mut faltantes = Vec::new();
            if col_usuario.is_none() {
                faltantes.push("usuario".to_string());
            }
            if col_clave.is_none() {
                faltantes.push("clave".to_string());
            }
            return Err(Error::ColumnasFaltantes {
                archivo: ruta.to_path_buf(),
                faltantes,
            });
        };

        let mut cargados = 0;
        for fila in &filas {
            let celda = |i: usize| fila.get(i).map(|s| s.trim()).unwrap_or("");
            let usuario = normalizar(celda(col_usuario));
            let clave = celda(col_clave);
            if usuario.is_empty() || clave.is_empty() {
                continue;
            }
            let rol = col_rol
                .map(celda)
                .filter(|r| !r.is_empty())
                .map(|r| {
                    Rol::desde_texto(r).unwrap_or_else(|| {
                        warn!("Rol desconocido '{}' para {}, se asigna usuario", r, usuario);
                        Rol::Usuario
                    })
                })
                .unwrap_or(Rol::Usuario);
            self.usuarios.insert(
                usuario,
                RegistroUsuario {
                    rol,
                    clave: hash_password(clave, self.iteraciones),
                },
            );
            cargados += 1;
        }

        self.guardar()?;
        info!("Credenciales importadas: {} desde {}", cargados, ruta.display());
        Ok(cargados)
    }
}

fn leer_tabla_credenciales(ruta: &Path) -> Resultado<(Vec<String>, Vec<Vec<String>>)> {
    let es_csv = ruta
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if es_csv {
        let mut lector = csv::ReaderBuilder::new().flexible(true).from_path(ruta)?;
        let encabezados = lector.headers()?.iter().map(|h| h.trim().to_string()).collect();
        let mut filas = Vec::new();
        for registro in lector.records() {
            filas.push(registro?.iter().map(str::to_string).collect());
        }
        Ok((encabezados, filas))
    } else {
        let hoja = leer_primera_hoja(ruta)?;
        let filas = hoja
            .filas
            .iter()
            .map(|f| f.iter().map(texto_celda).collect())
            .collect();
        Ok((hoja.encabezados, filas))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ITERS: u32 = 1_000;

    #[test]
    fn permisos_por_rol() {
        assert!(Rol::Admin.permite(Permiso::Administrar));
        assert!(Rol::Usuario.permite(Permiso::Procesar));
        assert!(!Rol::Usuario.permite(Permiso::DescargarAuditoria));
        assert!(!Rol::Auditor.permite(Permiso::Procesar));
        assert!(Rol::Auditor.permite(Permiso::DescargarAuditoria));
        assert!(matches!(
            Rol::Auditor.exigir(Permiso::Administrar),
            Err(Error::PermisoDenegado { .. })
        ));
    }

    #[test]
    fn siembra_usuarios_por_defecto() {
        let dir = tempfile::tempdir().unwrap();
        let ruta = dir.path().join("data").join("users.json");
        let almacen = AlmacenUsuarios::abrir(&ruta, ITERS).unwrap();

        assert!(ruta.exists());
        assert_eq!(almacen.len(), 3);
        assert_eq!(almacen.autenticar(" Admin ", "admin123"), Some(Rol::Admin));
        assert_eq!(almacen.autenticar("auditor", "audit456"), Some(Rol::Auditor));
        assert_eq!(almacen.autenticar("usuario", "malo"), None);
        assert_eq!(almacen.autenticar("nadie", "admin123"), None);

        let json = std::fs::read_to_string(&ruta).unwrap();
        assert!(json.contains("\"role\": \"admin\""));
        assert!(!json.contains("admin123"));
    }

    #[test]
    fn almacen_danado_se_regenera() {
        let dir = tempfile::tempdir().unwrap();
        let ruta = dir.path().join("users.json");
        std::fs::write(&ruta, "no es json").unwrap();
        let almacen = AlmacenUsuarios::abrir(&ruta, ITERS).unwrap();
        assert_eq!(almacen.autenticar("usuario", "user789"), Some(Rol::Usuario));
    }

    #[test]
    fn upsert_y_restablecer() {
        let dir = tempfile::tempdir().unwrap();
        let ruta = dir.path().join("users.json");
        let mut almacen = AlmacenUsuarios::abrir(&ruta, ITERS).unwrap();

        almacen.upsert("  Ana ", "secreta", Rol::Auditor).unwrap();
        let reabierto = AlmacenUsuarios::abrir(&ruta, ITERS).unwrap();
        assert_eq!(reabierto.autenticar("ana", "secreta"), Some(Rol::Auditor));

        assert!(matches!(
            almacen.restablecer("otro", "RESET-USME-2026"),
            Err(Error::CodigoResetIncorrecto)
        ));
        almacen.restablecer(" RESET-USME-2026 ", "RESET-USME-2026").unwrap();
        assert_eq!(almacen.rol("ana"), None);
        assert_eq!(almacen.len(), 3);
    }

    #[test]
    fn importa_credenciales_csv() {
        let dir = tempfile::tempdir().unwrap();
        let mut almacen = AlmacenUsuarios::abrir(&dir.path().join("users.json"), ITERS).unwrap();
        let csv = dir.path().join("credenciales.csv");
        std::fs::write(&csv, "Usuario,Clave,Rol\nPedro,p1,auditor\nluisa,l2,\n,sin,admin\n").unwrap();

        assert_eq!(almacen.importar(&csv).unwrap(), 2);
        assert_eq!(almacen.autenticar("pedro", "p1"), Some(Rol::Auditor));
        assert_eq!(almacen.autenticar("luisa", "l2"), Some(Rol::Usuario));
    }

    #[test]
    fn importar_sin_columna_de_clave_falla() {
        let dir = tempfile::tempdir().unwrap();
        let mut almacen = AlmacenUsuarios::abrir(&dir.path().join("users.json"), ITERS).unwrap();
        let csv = dir.path().join("c.csv");
        std::fs::write(&csv, "usuario,nombre\npedro,Pedro\n").unwrap();

        match almacen.importar(&csv) {
            Err(Error::ColumnasFaltantes { faltantes, .. }) => assert_eq!(faltantes, vec!["clave"]),
            otro => panic!("se esperaba ColumnasFaltantes, hubo {:?}", otro.map(|_| ())),
        }
    }
}
