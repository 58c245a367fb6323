use crate::error::Result;
use crate::generator::{Generator, GeneratorConfig};

/// Open a session with the generator at `address`.
pub fn connect(address: &str) -> Result<Generator> {
    connect_with_config(address, GeneratorConfig::default())
}

/// Open a session with explicit configuration.
///
/// Unlike [`Generator::open`], a failed open is returned as the error
/// alone; no failed session is left behind.
pub fn connect_with_config(address: &str, config: GeneratorConfig) -> Result<Generator> {
    let mut generator = Generator::with_config(config);
    generator.open(address)?;
    Ok(generator)
}
