//! Limpieza de números y texto extraídos de los PDF.

use once_cell::sync::Lazy;
use regex::Regex;

static ESPACIOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Convierte un importe con separadores de miles (`$1.000.000`, `2,500`) a entero.
///
/// Los separadores se descartan sin distinguir miles de decimales, igual que
/// en las planillas de origen. Vacío, `-`, texto sin dígitos o un valor que
/// no cabe en `u64` devuelven `0`.
pub fn limpiar_numero(valor: &str) -> u64 {
    let valor = valor.trim();
    if valor.is_empty() || valor == "-" {
        return 0;
    }
    let digitos: String = valor.chars().filter(|c| c.is_ascii_digit()).collect();
    digitos.parse().unwrap_or(0)
}

/// Recorta y colapsa espacios internos.
pub fn normalizar_texto(texto: &str) -> String {
    ESPACIOS.replace_all(texto.trim(), " ").into_owned()
}

/// Rellena con ceros a la izquierda hasta `ancho` caracteres.
pub fn rellenar_ceros(valor: &str, ancho: usize) -> String {
    format!("{:0>ancho$}", valor, ancho = ancho)
}

/// Nombre de archivo sin directorio, para reportes y bitácora.
pub fn nombre_archivo(ruta: &std::path::Path) -> String {
    ruta.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| ruta.display().to_string())
}
