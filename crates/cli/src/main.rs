use clap::{Parser, Subcommand, ValueEnum};
use intake_core::language::{filter_items, Language};
use intake_core::normalize::normalize_template;
use intake_core::template::{FormTemplate, RawTemplate};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "intake")]
#[command(about = "Intake form template tooling")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
enum LanguageArg {
    Primary,
    Alternate,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Primary => Language::Primary,
            LanguageArg::Alternate => Language::Alternate,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize a template file and report whether it is usable
    Check {
        /// Path to a template JSON file
        file: PathBuf,
    },
    /// Normalize a template file and print every item
    Inspect {
        /// Path to a template JSON file
        file: PathBuf,
    },
    /// Print the filtered, demographics-first step sequence
    Sequence {
        /// Path to a template JSON file
        file: PathBuf,
        /// Language selection
        #[arg(long, value_enum, default_value = "primary")]
        language: LanguageArg,
    },
}

fn load_template(file: &PathBuf) -> Result<FormTemplate, Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(file)?;
    let raw: RawTemplate = serde_json::from_str(&contents)?;
    Ok(normalize_template(raw)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Check { file }) => match load_template(&file) {
            Ok(template) => {
                println!(
                    "OK: '{}' with {} items",
                    template.title,
                    template.items.len()
                );
            }
            Err(e) => {
                eprintln!("Unusable template: {}", e);
                std::process::exit(1);
            }
        },
        Some(Commands::Inspect { file }) => {
            let template = load_template(&file)?;
            println!("Template: {} ({})", template.title, template.id);
            for (index, item) in template.items.iter().enumerate() {
                println!(
                    "{:>3}. [{}]{} {} — {}",
                    index + 1,
                    item.variant(),
                    if item.is_required { " required" } else { "" },
                    item.id,
                    item.question_text
                );
            }
        }
        Some(Commands::Sequence { file, language }) => {
            let template = load_template(&file)?;
            let language = Language::from(language);
            let filtered = filter_items(&template, language);
            if filtered.is_empty() {
                println!("No steps for {:?}", language);
            } else {
                for (step, index) in filtered.iter().enumerate() {
                    let item = &template.items[*index];
                    println!(
                        "Step {:>2}: [{}] {}",
                        step + 1,
                        item.variant(),
                        item.question_text
                    );
                }
            }
        }
        None => {
            println!("Use 'intake --help' for commands");
        }
    }

    Ok(())
}
