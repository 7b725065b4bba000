use clap::Parser;

use crate::grid::GridLayout;

/// Command-line configuration for the server
#[derive(Parser, Debug, Clone)]
#[command(name = "xlsx-vault", about = "Upload, browse and edit Excel workbooks")]
pub struct Config {
    /// Address the HTTP server listens on
    #[arg(long, default_value = "127.0.0.1:3000", env = "XLSX_VAULT_BIND")]
    pub bind: String,

    /// SQLite connection URL; the file is created when missing
    #[arg(long, default_value = "sqlite://xlsx-vault.db", env = "DATABASE_URL")]
    pub database_url: String,

    /// Size of the database connection pool
    #[arg(long, default_value_t = 5, env = "XLSX_VAULT_MAX_CONNECTIONS")]
    pub max_connections: u32,

    /// Largest accepted request body, in bytes
    #[arg(long, default_value_t = 20 * 1024 * 1024, env = "XLSX_VAULT_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    /// Directory served under /static
    #[arg(long, default_value = "static", env = "XLSX_VAULT_STATIC_DIR")]
    pub static_dir: String,

    /// Columns left out of the detail grid (comma-separated or repeated)
    #[arg(long = "hide-column", value_delimiter = ',', env = "XLSX_VAULT_HIDE_COLUMNS")]
    pub hide_columns: Vec<String>,

    /// Columns edited through a selector, as NAME=option|option
    /// Example: --choice-column "Status=Open|In progress|Done"
    #[arg(
        long = "choice-column",
        value_parser = parse_choice_column,
        env = "XLSX_VAULT_CHOICE_COLUMNS",
        value_delimiter = ';'
    )]
    pub choice_columns: Vec<(String, Vec<String>)>,

    /// Columns edited through a free-text area (comma-separated or repeated)
    #[arg(long = "note-column", value_delimiter = ',', env = "XLSX_VAULT_NOTE_COLUMNS")]
    pub note_columns: Vec<String>,
}

impl Config {
    pub fn grid_layout(&self) -> GridLayout {
        GridLayout {
            hidden: self.hide_columns.clone(),
            choices: self.choice_columns.iter().cloned().collect(),
            notes: self.note_columns.clone(),
        }
    }
}

fn parse_choice_column(value: &str) -> Result<(String, Vec<String>), String> {
    let (name, options) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=option|option, got '{}'", value))?;

    let name = name.trim();
    if name.is_empty() {
        return Err("choice column name cannot be empty".to_string());
    }

    let options: Vec<String> = options
        .split('|')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .map(str::to_string)
        .collect();
    if options.is_empty() {
        return Err(format!("choice column '{}' has no options", name));
    }

    Ok((name.to_string(), options))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::ColumnKind;

    #[test]
    fn defaults() {
        let config = Config::try_parse_from(["xlsx-vault"]).unwrap();
        assert_eq!(config.bind, "127.0.0.1:3000");
        assert_eq!(config.max_connections, 5);
        assert!(config.choice_columns.is_empty());
    }

    #[test]
    fn column_flags_build_the_layout() {
        let config = Config::try_parse_from([
            "xlsx-vault",
            "--hide-column",
            "id,internal",
            "--choice-column",
            "Status=Open| Done |",
            "--note-column",
            "Remarks",
        ])
        .unwrap();

        let layout = config.grid_layout();
        assert_eq!(layout.hidden, vec!["id", "internal"]);
        assert_eq!(layout.kind("Remarks"), ColumnKind::Note);
        assert_eq!(layout.choices["Status"], vec!["Open", "Done"]);
    }

    #[test]
    fn malformed_choice_columns_are_rejected() {
        assert!(parse_choice_column("Status").is_err());
        assert!(parse_choice_column("=a|b").is_err());
        assert!(parse_choice_column("Status=|").is_err());
        assert!(Config::try_parse_from(["xlsx-vault", "--choice-column", "nope"]).is_err());
    }
}
