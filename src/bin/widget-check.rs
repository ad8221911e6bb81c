use std::env;
use std::fs;
use std::path::Path;
use std::process;
use widget_builder::{build_edit_form, list_required_assets, validate_definition};
use widget_builder::{WidgetDefinition, WidgetError};

fn main() {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: widget-check <widget.json|widget.yaml>...");
        eprintln!();
        eprintln!("Examples:");
        eprintln!("  widget-check hero.json");
        eprintln!("  widget-check widgets/*.yaml");
        process::exit(1);
    }

    let mut exit_code = 0;

    for file_path in &args[1..] {
        match check_file(file_path) {
            Ok(summary) => {
                println!("✓ {} is valid ({})", file_path, summary);
            }
            Err(e) => {
                eprintln!("✗ {} has errors:", file_path);
                print_error(&e);
                exit_code = 1;
            }
        }
    }

    process::exit(exit_code);
}

fn check_file(path: &str) -> Result<String, WidgetError> {
    let content = fs::read_to_string(path)
        .map_err(|e| WidgetError::DeserializationError(format!("Failed to read file: {}", e)))?;

    let is_yaml = matches!(
        Path::new(path).extension().and_then(|ext| ext.to_str()),
        Some("yaml" | "yml")
    );
    let definition = if is_yaml {
        WidgetDefinition::from_yaml(&content)?
    } else {
        WidgetDefinition::from_json(&content)?
    };

    validate_definition(&definition)?;
    let form = build_edit_form(&definition)?;
    let assets = list_required_assets(&definition);

    Ok(format!("{} form fields, {} assets", form.len(), assets.len()))
}

fn print_error(error: &WidgetError) {
    match error {
        WidgetError::Schema { path, reason } => {
            eprintln!("  Invalid field '{}':", path);
            eprintln!("    {}", reason);
        }
        WidgetError::MaxNestingDepthExceeded { max_depth } => {
            eprintln!("  Maximum nesting depth ({}) exceeded", max_depth);
            eprintln!("    Fields are nested too deeply");
        }
        WidgetError::TemplateSyntax {
            line,
            column,
            message,
        } => {
            eprintln!("  Template syntax error at line {}, column {}:", line, column);
            eprintln!("    {}", message);
        }
        WidgetError::TemplateEvaluation(msg) => {
            eprintln!("  Template evaluation error:");
            eprintln!("    {}", msg);
        }
        WidgetError::DeserializationError(msg) => {
            eprintln!("  Deserialization error:");
            eprintln!("    {}", msg);
        }
    }
}
