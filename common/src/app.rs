//! Aplicaciones map/reduce disponibles, seleccionables por nombre.

use anyhow::{bail, Result};

use crate::store::KeyValue;
use crate::{indexer, wordcount};

/// `(nombre_de_entrada, contenido) -> registros intermedios`
pub type MapFn = fn(input_name: &str, contents: &str) -> Vec<KeyValue>;

/// `(clave, valores en orden) -> valor reducido`
pub type ReduceFn = fn(key: &str, values: &[String]) -> String;

#[derive(Clone, Copy)]
pub struct Application {
    pub name: &'static str,
    pub map_fn: MapFn,
    pub reduce_fn: ReduceFn,
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application").field("name", &self.name).finish()
    }
}

pub fn try_named(name: &str) -> Option<Application> {
    match name {
        "wc" => Some(Application {
            name: "wc",
            map_fn: wordcount::map,
            reduce_fn: wordcount::reduce,
        }),
        "indexer" => Some(Application {
            name: "indexer",
            map_fn: indexer::map,
            reduce_fn: indexer::reduce,
        }),
        _ => None,
    }
}

pub fn named(name: &str) -> Result<Application> {
    match try_named(name) {
        Some(app) => Ok(app),
        None => bail!("no existe la aplicación `{}` (disponibles: wc, indexer)", name),
    }
}

/// Palabras normalizadas: sólo alfanumérico y '_', en minúscula.
pub(crate) fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split_whitespace().filter_map(|raw| {
        let cleaned: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '_')
            .collect::<String>()
            .to_lowercase();
        (!cleaned.is_empty()).then_some(cleaned)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_resolves_known_apps() {
        assert_eq!(named("wc").unwrap().name, "wc");
        assert_eq!(named("indexer").unwrap().name, "indexer");
        assert!(named("grep").is_err());
    }

    #[test]
    fn tokenize_cleans_and_lowercases() {
        let words: Vec<String> = tokenize("Hola hola, MUNDO!! mundo_prueba ...").collect();
        assert_eq!(words, vec!["hola", "hola", "mundo", "mundo_prueba"]);
    }
}
