use std::path::Path;

use anyhow::Context;
use indoc::indoc;

use crate::Config;

pub(crate) fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Config> {
    let path = path.as_ref();

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read configuration file {}", path.display()))?;

    let config: Config = toml::from_str(&content)?;
    config.validate()?;

    for warning in collect_warnings(&config) {
        log::warn!("{warning}");
    }

    log::debug!(
        "Loaded streaming configuration from {}: buffer_size={}, drop_policy={:?}",
        path.display(),
        config.streaming.backpressure.buffer_size,
        config.streaming.backpressure.drop_policy
    );

    Ok(config)
}

/// Settings that are valid but likely to surprise at runtime.
pub(crate) fn collect_warnings(config: &Config) -> Vec<String> {
    let mut warnings = Vec::new();
    let backpressure = &config.streaming.backpressure;

    if backpressure.buffer_size == 1 && backpressure.high_water_mark < 1.0 {
        warnings.push(
            indoc! {r#"
                streaming.backpressure.buffer_size is 1, so every write after the first lands at the high water mark
                and the drop policy decides its fate.
            "#}
            .trim_end()
            .to_string(),
        );
    }

    if let Some(pacing) = &config.streaming.pacing
        && pacing.burst as usize > backpressure.buffer_size
    {
        warnings.push(format!(
            "streaming.pacing.burst ({}) exceeds streaming.backpressure.buffer_size ({}); bursts will hit the drop policy",
            pacing.burst, backpressure.buffer_size
        ));
    }

    warnings
}
