//! WordCount: cada palabra emite `(palabra, "1")` y el reduce suma.

use crate::app::tokenize;
use crate::store::KeyValue;

pub fn map(_input_name: &str, contents: &str) -> Vec<KeyValue> {
    tokenize(contents).map(|w| KeyValue::new(w, "1")).collect()
}

pub fn reduce(_key: &str, values: &[String]) -> String {
    let total: u64 = values.iter().filter_map(|v| v.parse::<u64>().ok()).sum();
    total.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_emits_one_per_word() {
        let out = map("in.txt", "Hola hola, mundo!!\nmundo   mundo_prueba");
        let keys: Vec<&str> = out.iter().map(|kv| kv.key.as_str()).collect();
        assert_eq!(keys, vec!["hola", "hola", "mundo", "mundo", "mundo_prueba"]);
        assert!(out.iter().all(|kv| kv.value == "1"));
    }

    #[test]
    fn map_on_empty_input_is_empty() {
        assert!(map("vacio.txt", "").is_empty());
    }

    #[test]
    fn reduce_sums_values() {
        let values = vec!["1".to_string(), "1".to_string(), "3".to_string()];
        assert_eq!(reduce("hola", &values), "5");
    }
}
