//! Pruebas del binario `planillas`: sesión, roles y un flujo de proceso.
//!
//! Cada prueba corre en un directorio temporal con su propio
//! `planillas.toml`, así los usuarios, el estado de acceso y la bitácora no
//! se comparten.

#![allow(deprecated)] // cargo_bin deprecation, replacement not yet stable

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn entorno() -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("planillas.toml"),
        "[acceso]\niteraciones_hash = 1000\nmax_intentos = 2\n",
    )
    .unwrap();
    dir
}

fn planillas(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("planillas").expect("binary 'planillas' should be built");
    cmd.current_dir(dir.path())
        .env_remove("PLANILLAS_CONFIG")
        .env_remove("PLANILLAS_CLAVE")
        .env("RUST_LOG", "warn");
    cmd
}

fn ingresar(dir: &TempDir, usuario: &str, clave: &str) {
    planillas(dir)
        .args(["ingresar", "--usuario", usuario, "--clave", clave])
        .assert()
        .success();
}

#[test]
fn help_lista_los_comandos() {
    let dir = entorno();
    planillas(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: planillas"))
        .stdout(predicate::str::contains("ingresar"))
        .stdout(predicate::str::contains("crp"))
        .stdout(predicate::str::contains("plantilla-pagos"))
        .stdout(predicate::str::contains("auditoria"));
}

#[test]
fn ingreso_estado_y_salida() {
    let dir = entorno();
    planillas(&dir)
        .args(["ingresar", "--usuario", "Admin", "--clave", "admin123"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Sesión iniciada: admin (admin)"));

    planillas(&dir)
        .arg("estado")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sesión: admin (admin)"))
        .stdout(predicate::str::contains("Bloqueo: no"));

    planillas(&dir)
        .arg("salir")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sesión de admin cerrada"));

    let accesos = std::fs::read_to_string(dir.path().join("logs").join("accesos.log")).unwrap();
    assert!(accesos.contains("Login exitoso: admin (role=admin)"));
    assert!(accesos.contains("Logout: admin"));
    assert!(dir.path().join("data").join("users.json").exists());
}

#[test]
fn clave_por_variable_de_entorno() {
    let dir = entorno();
    planillas(&dir)
        .args(["ingresar", "--usuario", "usuario"])
        .env("PLANILLAS_CLAVE", "user789")
        .assert()
        .success()
        .stdout(predicate::str::contains("Sesión iniciada: usuario (usuario)"));
}

#[test]
fn intentos_fallidos_bloquean() {
    let dir = entorno();
    planillas(&dir)
        .args(["ingresar", "--usuario", "admin", "--clave", "mala"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("credenciales inválidas"));

    planillas(&dir)
        .args(["ingresar", "--usuario", "admin", "--clave", "mala"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cuenta bloqueada"));

    planillas(&dir)
        .args(["ingresar", "--usuario", "admin", "--clave", "admin123"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cuenta bloqueada"));

    let alertas = std::fs::read_to_string(dir.path().join("logs").join("alerts.log")).unwrap();
    assert!(alertas.contains("ALERT - WARNING - Bloqueo temporal por intentos fallidos. Usuario=admin"));
}

#[test]
fn procesar_exige_sesion_y_rol() {
    let dir = entorno();
    let pdf = dir.path().join("s.pdf");
    common::escribir(&pdf, &common::pdf_con_lineas(&["VALOR", "1.000"]));

    planillas(&dir)
        .args(["cdp", "s.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no hay una sesión activa"));

    ingresar(&dir, "auditor", "audit456");
    planillas(&dir)
        .args(["cdp", "s.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("el rol auditor no tiene permiso para procesar archivos"));

    planillas(&dir)
        .args(["auditoria", "exportar", "--salida", "auditoria.xlsx"])
        .assert()
        .success();
    assert!(dir.path().join("auditoria.xlsx").exists());
}

#[test]
fn cdp_genera_plantilla() {
    let dir = entorno();
    let pdf = dir.path().join("solicitud.pdf");
    common::escribir(
        &pdf,
        &common::pdf_con_lineas(&["PROYECTO 2145 USME", "VALOR", "$ 3.000.000"]),
    );

    ingresar(&dir, "usuario", "user789");
    planillas(&dir)
        .args(["cdp", "solicitud.pdf", "--salida", "salidas/cdp.xlsx"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 de 1 PDF exportados"));

    assert!(dir.path().join("salidas").join("cdp.xlsx").exists());
    let accesos = std::fs::read_to_string(dir.path().join("logs").join("accesos.log")).unwrap();
    assert!(accesos.contains("Procesado PDF: solicitud.pdf"));
}

#[test]
fn crp_sin_registros_no_escribe_plantilla() {
    let dir = entorno();
    common::escribir(&dir.path().join("carta.pdf"), &common::pdf_con_lineas(&["sin tabla"]));
    common::libro(
        &dir.path().join("equivalencias.xlsx"),
        &["CDP", "No. Interno", "Objeto"],
        &[&["123", "A1", "Servicios"]],
    );

    ingresar(&dir, "usuario", "user789");
    planillas(&dir)
        .args(["crp", "carta.pdf", "-e", "equivalencias.xlsx", "-s", "crp.xlsx"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No se encontraron registros válidos."));
    assert!(!dir.path().join("crp.xlsx").exists());
}

#[test]
fn admin_crea_usuarios() {
    let dir = entorno();
    ingresar(&dir, "admin", "admin123");
    planillas(&dir)
        .args(["usuarios", "crear", "Ana", "--clave", "secreta", "--rol", "auditor"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Usuario ana guardado (auditor)"));

    planillas(&dir).arg("salir").assert().success();
    planillas(&dir)
        .args(["ingresar", "--usuario", "ana", "--clave", "secreta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("(auditor)"));

    planillas(&dir)
        .args(["usuarios", "crear", "otro", "--clave", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("administrar usuarios"));
}

#[test]
fn restablecer_con_codigo() {
    let dir = entorno();
    planillas(&dir)
        .args(["usuarios", "restablecer", "CODIGO-MALO"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("código de restablecimiento incorrecto"));

    planillas(&dir)
        .args(["usuarios", "restablecer", "RESET-USME-2026"])
        .assert()
        .success()
        .stdout(predicate::str::contains("admin/admin123"));
}
