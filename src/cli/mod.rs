mod config;
mod handlers;

use crate::error::{BindingError, Result};
use crate::variant::Variant;
use crate::DataBindingOptions;
use clap::{Arg, ArgAction, Command};
use std::time::Instant;

pub struct EnhancedCli {
    config: config::ConfigFile,
    start_time: Instant,
}

impl Default for EnhancedCli {
    fn default() -> Self {
        Self::new()
    }
}

impl EnhancedCli {
    pub fn new() -> Self {
        Self {
            config: config::ConfigFile::default(),
            start_time: Instant::now(),
        }
    }

    pub fn run(&mut self) -> Result<()> {
        self.start_time = Instant::now();
        let matches = self.build_cli().get_matches();

        if let Some(config_path) = matches.get_one::<String>("config") {
            self.config = config::load(config_path)?;
        }

        self.setup_logging(matches.get_count("verbose"));

        match matches.subcommand() {
            Some(("check", sub_matches)) => handlers::handle_check_command(self, sub_matches),
            Some(("eval", sub_matches)) => handlers::handle_eval_command(self, sub_matches),
            Some(("address", sub_matches)) => handlers::handle_address_command(sub_matches),
            _ => {
                println!("No subcommand specified. Use --help for usage information.");
                Ok(())
            }
        }
    }

    fn build_cli(&self) -> Command {
        Command::new(crate::NAME)
            .version(crate::VERSION)
            .about(crate::DESCRIPTION)
            .author("Kryon Development Team")
            .arg(
                Arg::new("config")
                    .short('c')
                    .long("config")
                    .value_name("FILE")
                    .help("Configuration file path")
                    .action(ArgAction::Set),
            )
            .arg(
                Arg::new("verbose")
                    .short('v')
                    .long("verbose")
                    .help("Increase verbosity (can be used multiple times)")
                    .action(ArgAction::Count),
            )
            .subcommand(
                Command::new("check")
                    .about("Compile an expression and print its program")
                    .arg(Arg::new("expression").help("Data expression").required(true).index(1)),
            )
            .subcommand(
                Command::new("eval")
                    .about("Evaluate an expression against scalar variables")
                    .arg(Arg::new("expression").help("Data expression").required(true).index(1))
                    .arg(Arg::new("define").short('D').long("define").value_name("NAME=VALUE").help("Bind a scalar variable").action(ArgAction::Append))
                    .arg(Arg::new("debug").short('d').long("debug").help("Dump the compiled program").action(ArgAction::SetTrue))
                    .arg(Arg::new("no-builtins").long("no-builtins").help("Do not register the built-in transforms").action(ArgAction::SetTrue)),
            )
            .subcommand(
                Command::new("address")
                    .about("Parse a data address and print its entries")
                    .arg(Arg::new("path").help("Data address, e.g. list[2].name").required(true).index(1)),
            )
    }

    fn setup_logging(&self, verbose_count: u8) {
        let log_level = match verbose_count {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        };
        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .format_timestamp_secs()
            .init();
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.start_time.elapsed().as_millis()
    }

    /// Config file values first, then command line flags
    pub fn build_options(&self, matches: &clap::ArgMatches) -> DataBindingOptions {
        let mut options = DataBindingOptions::default();
        self.config.apply(&mut options);
        if flag(matches, "debug") {
            options.debug_mode = true;
        }
        if flag(matches, "no-builtins") {
            options.builtin_transforms = false;
        }
        options
    }

    /// `-D` defines override variables from the config file
    pub fn build_variables(&self, matches: &clap::ArgMatches) -> Result<Vec<(String, Variant)>> {
        let mut variables: Vec<(String, Variant)> = Vec::new();
        if let Some(config_vars) = &self.config.variables {
            for (name, value) in config_vars {
                variables.push((name.clone(), parse_define_value(value)));
            }
        }

        if let Some(defines) = matches.get_many::<String>("define") {
            for define in defines {
                let (name, value) = define.split_once('=').ok_or_else(|| BindingError::InvalidFormat {
                    message: format!("Invalid variable definition: {}. Use NAME=VALUE format.", define),
                })?;
                let name = name.trim();
                let value = parse_define_value(value);
                match variables.iter_mut().find(|(existing, _)| existing == name) {
                    Some(entry) => entry.1 = value,
                    None => variables.push((name.to_string(), value)),
                }
            }
        }
        Ok(variables)
    }
}

fn flag(matches: &clap::ArgMatches, id: &str) -> bool {
    matches.try_get_one::<bool>(id).ok().flatten().copied().unwrap_or(false)
}

/// Bools and numbers keep their type, anything else binds as a string
pub fn parse_define_value(value: &str) -> Variant {
    let value = value.trim();
    match value {
        "true" => Variant::Bool(true),
        "false" => Variant::Bool(false),
        _ => {
            if let Ok(int) = value.parse::<i64>() {
                Variant::Int(int)
            } else if let Ok(float) = value.parse::<f64>() {
                Variant::Float(float)
            } else {
                Variant::String(value.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_matches(args: &[&str]) -> clap::ArgMatches {
        let cli = EnhancedCli::new();
        let mut argv = vec!["krbind", "eval"];
        argv.extend_from_slice(args);
        let matches = cli.build_cli().try_get_matches_from(argv).unwrap();
        matches.subcommand_matches("eval").unwrap().clone()
    }

    #[test]
    fn test_parse_define_value() {
        assert_eq!(parse_define_value("true"), Variant::Bool(true));
        assert_eq!(parse_define_value("42"), Variant::Int(42));
        assert_eq!(parse_define_value("-1.5"), Variant::Float(-1.5));
        assert_eq!(parse_define_value("kryon"), Variant::from("kryon"));
    }

    #[test]
    fn test_defines_override_config() {
        let mut cli = EnhancedCli::new();
        let mut config_vars = std::collections::BTreeMap::new();
        config_vars.insert("x".to_string(), "1".to_string());
        config_vars.insert("y".to_string(), "2".to_string());
        cli.config.variables = Some(config_vars);

        let matches = eval_matches(&["x+y", "-D", "y=5", "-D", "name=abc"]);
        let variables = cli.build_variables(&matches).unwrap();
        assert_eq!(
            variables,
            vec![
                ("x".to_string(), Variant::Int(1)),
                ("y".to_string(), Variant::Int(5)),
                ("name".to_string(), Variant::from("abc")),
            ]
        );
    }

    #[test]
    fn test_invalid_define() {
        let cli = EnhancedCli::new();
        let matches = eval_matches(&["x", "-D", "x"]);
        assert!(matches!(
            cli.build_variables(&matches),
            Err(BindingError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_build_options() {
        let mut cli = EnhancedCli::new();
        cli.config.default_alias = Some("row".to_string());
        let options = cli.build_options(&eval_matches(&["1", "--debug", "--no-builtins"]));
        assert!(options.debug_mode);
        assert!(!options.builtin_transforms);
        assert_eq!(options.default_alias, "row");
    }
}
