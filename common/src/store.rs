//! Almacenamiento intermedio particionado sobre un filesystem compartido.
//!
//! Layout dentro de `root`:
//!
//! ```text
//! mr-intermediate/part-<p>/map-<task_id>.jsonl   segmentos publicados por cada map
//! mr-intermediate/part-<p>/.tmpXXXX              staging (se ignora al leer)
//! mr-out-<p>                                     salida final de cada reduce
//! ```
//!
//! Todo lo visible se publica con write-to-temp + rename, así que nunca se
//! lee un archivo a medio escribir aunque dos workers ejecuten la misma tarea.

use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    hash::Hasher,
    io::{self, BufRead, BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};
use tempfile::NamedTempFile;

const INTERMEDIATE_DIR: &str = "mr-intermediate";
const SEGMENT_EXT: &str = "jsonl";
const OUTPUT_PREFIX: &str = "mr-out-";

/// Registro clave/valor. En disco va como una línea JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

impl KeyValue {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Hash estable entre procesos (FNV-1a de 64 bits), recortado a 31 bits.
pub fn ihash(key: &str) -> u32 {
    let mut h = fnv::FnvHasher::default();
    h.write(key.as_bytes());
    (h.finish() & 0x7fff_ffff) as u32
}

/// Partición a la que va `key`: `ihash(key) % n_reduce`.
pub fn partition_for(key: &str, n_reduce: u32) -> u32 {
    ihash(key) % n_reduce.max(1)
}

#[derive(Debug, Clone)]
pub struct IntermediateStore {
    root: PathBuf,
}

impl IntermediateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn partition_dir(&self, partition: u32) -> PathBuf {
        self.root
            .join(INTERMEDIATE_DIR)
            .join(format!("part-{}", partition))
    }

    pub fn output_path(&self, partition: u32) -> PathBuf {
        self.root.join(format!("{}{}", OUTPUT_PREFIX, partition))
    }

    /// Borra los datos intermedios y las salidas `mr-out-<p>` de un job
    /// anterior. Lo llama el coordinator al arrancar, antes de repartir tareas.
    pub fn reset(&self) -> io::Result<()> {
        match fs::remove_dir_all(self.root.join(INTERMEDIATE_DIR)) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }

        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        for entry in entries {
            let path = entry?.path();
            if is_output(&path) && path.is_file() {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }

    /// Agrega `records` a la partición como un segmento propio de `producer`.
    ///
    /// Los registros se escriben primero en un archivo temporal dentro del
    /// directorio de la partición y luego se renombran a `map-<producer>.jsonl`.
    /// Si la misma tarea map se ejecuta dos veces, el segundo rename reemplaza
    /// al primero en vez de duplicar los registros.
    pub fn append_to_partition(
        &self,
        partition: u32,
        producer: &str,
        records: &[KeyValue],
    ) -> io::Result<PathBuf> {
        let dir = self.partition_dir(partition);
        fs::create_dir_all(&dir)?;

        let mut staging = NamedTempFile::new_in(&dir)?;
        {
            let mut writer = BufWriter::new(staging.as_file_mut());
            for kv in records {
                serde_json::to_writer(&mut writer, kv)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }

        let target = dir.join(format!("map-{}.{}", producer, SEGMENT_EXT));
        staging.persist(&target)?;
        Ok(target)
    }

    /// Devuelve todos los registros publicados en la partición.
    /// Una partición que nadie escribió se lee como vacía.
    pub fn read_partition(&self, partition: u32) -> io::Result<Vec<KeyValue>> {
        let dir = self.partition_dir(partition);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut segments: Vec<PathBuf> = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if is_segment(&path) {
                segments.push(path);
            }
        }
        segments.sort();

        let mut out = Vec::new();
        for segment in &segments {
            read_segment(segment, &mut out)?;
        }
        Ok(out)
    }

    /// Escribe la salida final de la partición (una línea por elemento).
    /// Se publica con rename, así que es seguro que dos workers la escriban.
    pub fn write_output<I, S>(&self, partition: u32, lines: I) -> io::Result<PathBuf>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let dir = if self.root.as_os_str().is_empty() {
            Path::new(".")
        } else {
            self.root.as_path()
        };
        fs::create_dir_all(dir)?;

        let mut staging = NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(staging.as_file_mut());
            for line in lines {
                writeln!(writer, "{}", line.as_ref())?;
            }
            writer.flush()?;
        }

        let target = self.output_path(partition);
        staging.persist(&target)?;
        Ok(target)
    }
}

fn is_segment(path: &Path) -> bool {
    let hidden = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true);
    !hidden && path.extension().and_then(|e| e.to_str()) == Some(SEGMENT_EXT)
}

// sólo `mr-out-<número>`, para no tocar otros archivos del directorio
fn is_output(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .and_then(|n| n.strip_prefix(OUTPUT_PREFIX))
        .map(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
        .unwrap_or(false)
}

fn read_segment(path: &Path, out: &mut Vec<KeyValue>) -> io::Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let kv: KeyValue = serde_json::from_str(&line).map_err(|e| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("registro inválido en {}: {e}", path.display()),
            )
        })?;
        out.push(kv);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{env, fs};

    fn temp_dir(sub: &str) -> PathBuf {
        let base = env::temp_dir().join("store_tests").join(sub);
        let _ = fs::remove_dir_all(&base);
        fs::create_dir_all(&base).unwrap();
        base
    }

    fn kv(k: &str, v: &str) -> KeyValue {
        KeyValue::new(k, v)
    }

    #[test]
    fn partition_for_is_in_range_and_deterministic() {
        for key in ["a", "b", "xyz", "otro", ""] {
            let p = partition_for(key, 7);
            assert!(p < 7);
            assert_eq!(p, partition_for(key, 7));
        }
        // FNV-1a 64 de "a" recortado a 31 bits
        assert_eq!(ihash("a"), (0xaf63dc4c8601ec8c_u64 & 0x7fff_ffff) as u32);
    }

    #[test]
    fn read_partition_collects_every_segment() {
        let tmp = temp_dir("collect");
        let store = IntermediateStore::new(&tmp);

        store
            .append_to_partition(0, "m1", &[kv("a", "1"), kv("b", "1")])
            .unwrap();
        store.append_to_partition(0, "m2", &[kv("a", "1")]).unwrap();
        store.append_to_partition(1, "m2", &[kv("z", "1")]).unwrap();

        let mut p0 = store.read_partition(0).unwrap();
        p0.sort_by(|x, y| x.key.cmp(&y.key));
        assert_eq!(p0, vec![kv("a", "1"), kv("a", "1"), kv("b", "1")]);
        assert_eq!(store.read_partition(1).unwrap(), vec![kv("z", "1")]);
    }

    #[test]
    fn same_producer_replaces_its_segment() {
        let tmp = temp_dir("replace");
        let store = IntermediateStore::new(&tmp);

        store.append_to_partition(3, "m1", &[kv("a", "1")]).unwrap();
        store.append_to_partition(3, "m1", &[kv("a", "1")]).unwrap();

        assert_eq!(store.read_partition(3).unwrap(), vec![kv("a", "1")]);
    }

    #[test]
    fn missing_partition_reads_empty() {
        let tmp = temp_dir("missing");
        let store = IntermediateStore::new(&tmp);
        assert!(store.read_partition(9).unwrap().is_empty());
    }

    #[test]
    fn staging_files_are_ignored() {
        let tmp = temp_dir("staging");
        let store = IntermediateStore::new(&tmp);
        store.append_to_partition(0, "m1", &[kv("a", "1")]).unwrap();

        // restos de un worker que murió a mitad de escritura
        let dir = store.partition_dir(0);
        fs::write(dir.join(".tmpABC123"), "{\"key\":\"basura\"").unwrap();

        assert_eq!(store.read_partition(0).unwrap(), vec![kv("a", "1")]);
    }

    #[test]
    fn corrupt_segment_is_an_error() {
        let tmp = temp_dir("corrupt");
        let store = IntermediateStore::new(&tmp);
        let dir = store.partition_dir(0);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("map-x.jsonl"), "no es json\n").unwrap();

        let err = store.read_partition(0).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn write_output_overwrites_whole_file() {
        let tmp = temp_dir("output");
        let store = IntermediateStore::new(&tmp);

        store.write_output(0, ["a 1", "b 2", "c 3"]).unwrap();
        let path = store.write_output(0, ["a 1", "b 2"]).unwrap();

        assert_eq!(path, tmp.join("mr-out-0"));
        assert_eq!(fs::read_to_string(path).unwrap(), "a 1\nb 2\n");
    }

    #[test]
    fn reset_clears_previous_job() {
        let tmp = temp_dir("reset");
        let store = IntermediateStore::new(&tmp);
        store.append_to_partition(0, "m1", &[kv("a", "1")]).unwrap();
        // salidas de un job anterior con más particiones
        for p in 0..5 {
            store.write_output(p, ["a 1"]).unwrap();
        }
        fs::write(tmp.join("a.txt"), "entrada").unwrap();
        fs::write(tmp.join("mr-out-notas"), "ajeno").unwrap();

        store.reset().unwrap();
        store.reset().unwrap();

        assert!(store.read_partition(0).unwrap().is_empty());
        for p in 0..5 {
            assert!(!store.output_path(p).exists(), "mr-out-{p} sigue ahí");
        }
        assert!(tmp.join("a.txt").exists());
        assert!(tmp.join("mr-out-notas").exists());
    }

    #[test]
    fn reset_on_missing_root_is_ok() {
        let tmp = temp_dir("reset_missing");
        let store = IntermediateStore::new(tmp.join("no-existe"));
        store.reset().unwrap();
    }
}
