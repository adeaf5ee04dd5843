use clap::{Parser, Subcommand};
use kiodb::{ColumnPatch, ColumnType, Condition, Operator, Record, Table};
use std::process;

/// kiodb CLI — inspect and mutate a .kiod table from the command line
#[derive(Parser)]
#[command(name = "kiodb", version, about)]
struct Cli {
    /// Path to the snapshot file (must end in .kiod)
    #[arg(long, default_value = "data.kiod")]
    file: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the schema: every column with type, default and uniqueness
    Columns,

    /// Add a column to the schema
    AddColumn {
        /// Column name
        name: String,
        /// Column type: string, number, boolean or object
        #[arg(long, default_value = "string")]
        r#type: String,
        /// Default value (JSON, e.g. --default '"member"' or --default 0)
        #[arg(long)]
        default: Option<String>,
        /// Enforce uniqueness on this column
        #[arg(long)]
        unique: bool,
    },

    /// Edit an existing column
    EditColumn {
        /// Column name
        name: String,
        /// New name
        #[arg(long)]
        rename: Option<String>,
        /// New type: string, number, boolean or object
        #[arg(long)]
        r#type: Option<String>,
        /// New default value (JSON)
        #[arg(long)]
        default: Option<String>,
        /// New uniqueness flag
        #[arg(long)]
        unique: Option<bool>,
    },

    /// Delete one or more columns
    DeleteColumn {
        /// Column names
        names: Vec<String>,
    },

    /// Insert a record
    Insert {
        /// Field values (e.g. --field name=Alice --field 'age=30')
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
    },

    /// Select records matching all given conditions
    Select {
        /// Conditions (e.g. --where 'age > 18' --where 'active == true')
        #[arg(long = "where", value_parser = parse_condition)]
        conditions: Vec<Condition>,
        /// Require every referenced column to be unique; print first match
        #[arg(long)]
        unique: bool,
    },

    /// Update matching records with the given fields
    Update {
        /// Field values to merge in
        #[arg(long = "field", value_parser = parse_key_value)]
        fields: Vec<(String, String)>,
        /// Conditions selecting the records to update
        #[arg(long = "where", value_parser = parse_condition)]
        conditions: Vec<Condition>,
    },

    /// Delete matching records (no conditions deletes everything)
    Delete {
        /// Conditions selecting the records to delete
        #[arg(long = "where", value_parser = parse_condition)]
        conditions: Vec<Condition>,
    },

    /// Remove all records, keeping the schema
    Clear,

    /// Show table statistics and row/column counts
    Status,

    /// Export the table as markdown to <output>.md
    Export {
        /// Output path stem
        output: String,
        /// Maximum number of rows to render
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid key=value pair: no '=' found in '{s}'"))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Parse a `column op value` condition, e.g. `age > 18` or `name == Alice`.
fn parse_condition(s: &str) -> Result<Condition, String> {
    let parts: Vec<&str> = s.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(format!(
            "Invalid condition '{s}': expected 'column op value'"
        ));
    }
    let column = parts[0];
    let operator: Operator = parts[1].parse().map_err(|e| format!("{e}"))?;
    let raw = parts[2..].join(" ");
    let raw = raw.as_str();
    let operand = serde_json::from_str(raw).unwrap_or(serde_json::Value::String(raw.to_string()));
    Ok(Condition::new(column, operator, operand))
}

fn parse_column_type(s: &str) -> Result<ColumnType, String> {
    match s {
        "string" => Ok(ColumnType::String),
        "number" => Ok(ColumnType::Number),
        "boolean" => Ok(ColumnType::Boolean),
        "object" => Ok(ColumnType::Object),
        other => Err(format!(
            "Unknown column type '{other}': expected string, number, boolean or object"
        )),
    }
}

fn parse_json(s: &str) -> serde_json::Value {
    serde_json::from_str(s).unwrap_or(serde_json::Value::String(s.to_string()))
}

fn fields_to_record(fields: &[(String, String)]) -> Record {
    let mut record = Record::new();
    for (key, val) in fields {
        record.insert(key.clone(), parse_json(val));
    }
    record
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("ERROR: {e}");
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut table = Table::open(&cli.file)?;

    match cli.command {
        Command::Columns => {
            print_json(&serde_json::to_value(table.columns())?);
        }

        Command::AddColumn {
            name,
            r#type,
            default,
            unique,
        } => {
            let column_type = parse_column_type(&r#type)?;
            let default = default
                .map(|raw| parse_json(&raw))
                .unwrap_or(serde_json::Value::Null);
            table.add_column_with(&name, column_type, default, unique)?;
            table.save()?;
            print_json(&serde_json::json!({ "ok": true, "added": name }));
        }

        Command::EditColumn {
            name,
            rename,
            r#type,
            default,
            unique,
        } => {
            let patch = ColumnPatch {
                name: rename,
                column_type: r#type.as_deref().map(parse_column_type).transpose()?,
                default: default.map(|raw| parse_json(&raw)),
                unique,
            };
            table.edit_column(&name, patch)?;
            table.save()?;
            print_json(&serde_json::json!({ "ok": true, "edited": name }));
        }

        Command::DeleteColumn { names } => {
            let refs: Vec<&str> = names.iter().map(String::as_str).collect();
            table.delete_columns(&refs)?;
            table.save()?;
            print_json(&serde_json::json!({ "ok": true, "deleted": names }));
        }

        Command::Insert { fields } => {
            table.insert(fields_to_record(&fields))?;
            table.save()?;
            print_json(&serde_json::json!({ "ok": true, "rows": table.len() }));
        }

        Command::Select { conditions, unique } => {
            if unique {
                let row = table.select_unique(&conditions)?;
                print_json(&serde_json::to_value(row)?);
            } else {
                let rows = table.select(&conditions)?;
                print_json(&serde_json::to_value(rows)?);
            }
        }

        Command::Update { fields, conditions } => {
            let updated = table.update(fields_to_record(&fields), &conditions)?;
            table.save()?;
            print_json(&serde_json::json!({ "ok": true, "updated": updated }));
        }

        Command::Delete { conditions } => {
            let deleted = table.delete(&conditions)?;
            table.save()?;
            print_json(&serde_json::json!({ "ok": true, "deleted": deleted }));
        }

        Command::Clear => {
            table.clear()?;
            table.save()?;
            print_json(&serde_json::json!({ "ok": true }));
        }

        Command::Status => {
            let stats = table.statistics();
            print_json(&serde_json::json!({
                "file": cli.file,
                "columns": table.columns().len(),
                "rows": table.len(),
                "createdAt": stats.created_at,
                "lastEditAt": stats.last_edit_at,
                "lastSavedAt": stats.last_saved_at,
            }));
        }

        Command::Export { output, rows } => {
            kiodb::export::export_markdown(&table, &output, rows)?;
            print_json(&serde_json::json!({ "ok": true, "wrote": format!("{output}.md") }));
        }
    }

    Ok(())
}

fn print_json(value: &serde_json::Value) {
    println!("{}", serde_json::to_string_pretty(value).unwrap());
}
