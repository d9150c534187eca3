use super::EnhancedCli;
use crate::expression::DataExpression;
use crate::model::{parse_address, AddressEntry};
use crate::{evaluate_expression_with_options, Result};

// --- CHECK ---
pub fn handle_check_command(cli: &EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let source = required(matches, "expression");
    println!("🔍 Checking '{}'", source);

    match DataExpression::compile(source) {
        Ok(expression) => {
            println!("✅ No issues found ({} instructions)", expression.program().len());
            let paths = expression.variable_paths();
            if !paths.is_empty() {
                println!("   Variables: {}", paths.join(", "));
            }
            print!("{}", expression.program());
            log::info!("Checked in {}ms", cli.elapsed_ms());
            Ok(())
        }
        Err(e) => {
            println!("❌ {}", e);
            Err(e)
        }
    }
}

// --- EVAL ---
pub fn handle_eval_command(cli: &EnhancedCli, matches: &clap::ArgMatches) -> Result<()> {
    let source = required(matches, "expression");
    let options = cli.build_options(matches);
    let variables = cli.build_variables(matches)?;

    for (name, value) in &variables {
        log::info!("Binding {} = {} ({})", name, value, value.type_name());
    }

    let value = evaluate_expression_with_options(source, &variables, &options)?;
    println!("{}", value);
    log::info!("Evaluated '{}' to a {} in {}ms", source, value.type_name(), cli.elapsed_ms());
    Ok(())
}

// --- ADDRESS ---
pub fn handle_address_command(matches: &clap::ArgMatches) -> Result<()> {
    let path = required(matches, "path");
    let address = parse_address(path)?;

    println!("{}", address);
    for (index, entry) in address.entries().iter().enumerate() {
        match entry {
            AddressEntry::Name(name) => println!("  {:>2}: name  {}", index, name),
            AddressEntry::Index(position) => println!("  {:>2}: index {}", index, position),
        }
    }
    Ok(())
}

// clap enforces required positionals before a handler runs
fn required<'a>(matches: &'a clap::ArgMatches, id: &str) -> &'a str {
    matches.get_one::<String>(id).map(String::as_str).unwrap_or_default()
}
