use crate::output::print_json;
use blinds_core::config::Config;

pub fn run(config: &Config) -> anyhow::Result<()> {
    print_json(config)
}
