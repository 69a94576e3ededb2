//! Índice invertido: palabra -> documentos donde aparece.
//!
//! La salida de reduce es `"<n> <doc1>,<doc2>,..."` con los documentos ordenados.

use std::collections::BTreeSet;

use crate::app::tokenize;
use crate::store::KeyValue;

pub fn map(input_name: &str, contents: &str) -> Vec<KeyValue> {
    let words: BTreeSet<String> = tokenize(contents).collect();
    words
        .into_iter()
        .map(|w| KeyValue::new(w, input_name))
        .collect()
}

pub fn reduce(_key: &str, values: &[String]) -> String {
    let docs: BTreeSet<&str> = values.iter().map(String::as_str).collect();
    let joined = docs.iter().copied().collect::<Vec<_>>().join(",");
    format!("{} {}", docs.len(), joined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_emits_each_word_once_per_document() {
        let out = map("a.txt", "el gato y el perro");
        let keys: Vec<&str> = out.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["el", "gato", "perro", "y"]);
        assert!(out.iter().all(|kv| kv.value == "a.txt"));
    }

    #[test]
    fn reduce_dedups_and_sorts_documents() {
        let values = vec!["b.txt".to_string(), "a.txt".to_string(), "b.txt".to_string()];
        assert_eq!(reduce("gato", &values), "2 a.txt,b.txt");
    }
}
