//! Planillas USME
//!
//! Genera las plantillas de cargue masivo (CRP, CDP y pagos) del Fondo de
//! Desarrollo Local de Usme a partir de los PDF de contratos, solicitudes y
//! órdenes de pago.
//!
//! - [`crp`]: filas de tabla de los PDF conciliadas contra la tabla de
//!   equivalencias CDP → `Plantilla_CRP` + `Inconsistencias`.
//! - [`cdp`]: un registro por solicitud leído por palabras clave.
//! - [`pagos`]: consolidado de órdenes de pago.
//! - [`plantilla_pagos`]: consolidado → filas C / P40 / P31.
//! - [`acceso`], [`usuarios`], [`seguridad`]: usuarios con clave PBKDF2,
//!   roles, bloqueo por intentos y expiración por inactividad.
//! - [`auditoria`]: bitácora de accesos y alertas.

pub mod acceso;
pub mod auditoria;
pub mod cdp;
pub mod config;
pub mod crp;
pub mod equivalencias;
pub mod error;
pub mod libro;
pub mod lote;
pub mod pagos;
pub mod pdf;
pub mod plantilla_pagos;
pub mod seguridad;
pub mod texto;
pub mod usuarios;

pub use error::{Error, Resultado};
