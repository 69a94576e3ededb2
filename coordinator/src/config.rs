use anyhow::{bail, Context, Result};
use clap::Parser;
use glob::glob;
use std::{net::SocketAddr, path::PathBuf, time::Duration};

#[derive(Parser, Debug)]
#[command(name = "coordinator")]
#[command(about = "Coordinator de MapReduce: reparte tareas map/reduce a los workers")]
pub struct CoordinatorArgs {
    /// Archivos de entrada (se aceptan patrones glob, ej: "data/pg-*.txt")
    #[arg(value_name = "INPUT", required = true)]
    pub inputs: Vec<String>,

    /// Cantidad de particiones / tareas reduce
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u32).range(1..))]
    pub n_reduce: u32,

    /// Segundos que un worker puede tener una tarea antes de reasignarla
    #[arg(long, default_value_t = 10, value_parser = clap::value_parser!(u64).range(1..=86_400))]
    pub lease_secs: u64,

    /// Cada cuántos segundos se barren leases vencidos
    #[arg(long, default_value_t = 2)]
    pub sweep_secs: u64,

    /// Dirección donde escucha el servidor HTTP
    #[arg(long, default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Directorio compartido con los workers (intermedios y salidas)
    #[arg(long, default_value = ".")]
    pub data_dir: PathBuf,

    /// Segundos que el servidor sigue vivo después de terminar el job,
    /// para que los workers reciban NONE
    #[arg(long, default_value_t = 3)]
    pub linger_secs: u64,
}

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    pub inputs: Vec<String>,
    pub n_reduce: u32,
    pub lease: Duration,
    pub sweep_interval: Duration,
    pub listen: SocketAddr,
    pub data_dir: PathBuf,
    pub linger: Duration,
}

impl CoordinatorConfig {
    pub fn from_args(args: CoordinatorArgs) -> Result<Self> {
        Ok(Self {
            inputs: expand_inputs(&args.inputs)?,
            n_reduce: args.n_reduce,
            lease: Duration::from_secs(args.lease_secs.max(1)),
            sweep_interval: Duration::from_secs(args.sweep_secs.max(1)),
            listen: args.listen,
            data_dir: args.data_dir,
            linger: Duration::from_secs(args.linger_secs),
        })
    }
}

/// Expande cada patrón con `glob`, en orden. Un patrón que no matchea
/// ningún archivo es un error: esa tarea map nunca podría completarse.
pub fn expand_inputs(patterns: &[String]) -> Result<Vec<String>> {
    let mut files = Vec::new();
    for pattern in patterns {
        let before = files.len();
        for entry in glob(pattern).with_context(|| format!("patrón inválido: {pattern}"))? {
            let path = entry?;
            if path.is_file() {
                files.push(path.to_string_lossy().to_string());
            }
        }
        if files.len() == before {
            bail!("ningún archivo de entrada coincide con {pattern}");
        }
    }
    Ok(files)
}
