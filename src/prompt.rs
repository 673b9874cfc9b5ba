//! Interactive `config init` questions

use std::io::{BufRead, Write};

use crate::config::{ConfigFile, ServerSection};
use crate::error::SqlizerError;

/// Answers collected by `config init`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitAnswers {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl InitAnswers {
    pub fn into_config_file(self) -> ConfigFile {
        ConfigFile {
            server: ServerSection {
                host: Some(self.host),
                port: Some(self.port),
                user: Some(self.user),
                password: Some(self.password),
            },
        }
    }
}

/// Where the password answer is read from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PasswordSource {
    /// The controlling terminal, with echo disabled
    Terminal,
    /// The same reader as the other answers (piped input, tests)
    Input,
}

/// Ask for host, port, user and password in that order.
///
/// Empty answers take the shown default; an invalid port or empty user is
/// asked again.
pub fn ask_init_answers<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    password_source: PasswordSource,
) -> Result<InitAnswers, SqlizerError> {
    let host = ask(
        input,
        output,
        "Enter the host name for your SQL Server instance",
        Some("localhost"),
    )?;

    let port = loop {
        let answer = ask(
            input,
            output,
            "Enter the port number for your SQL Server instance",
            Some("1433"),
        )?;
        match answer.parse::<u16>() {
            Ok(port) => break port,
            Err(_) => writeln!(output, "'{}' is not a valid port number", answer)
                .map_err(prompt_io_error)?,
        }
    };

    let user = loop {
        let answer = ask(input, output, "Target database user?", None)?;
        if !answer.is_empty() {
            break answer;
        }
        writeln!(output, "A user is required").map_err(prompt_io_error)?;
    };

    let password = ask_password(input, output, "Target database pass?", password_source)?;

    Ok(InitAnswers {
        host,
        port,
        user,
        password,
    })
}

fn ask<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    message: &str,
    default: Option<&str>,
) -> Result<String, SqlizerError> {
    let written = match default {
        Some(default) => write!(output, "? {} ({}) ", message, default),
        None => write!(output, "? {} ", message),
    };
    written.map_err(prompt_io_error)?;
    output.flush().map_err(prompt_io_error)?;

    let mut line = String::new();
    let read = input.read_line(&mut line).map_err(prompt_io_error)?;
    if read == 0 {
        return Err(SqlizerError::Config(
            "Input ended before all config values were answered".to_string(),
        ));
    }

    let answer = line.trim();
    Ok(match (answer.is_empty(), default) {
        (true, Some(default)) => default.to_string(),
        _ => answer.to_string(),
    })
}

fn ask_password<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    message: &str,
    source: PasswordSource,
) -> Result<String, SqlizerError> {
    let password = match source {
        PasswordSource::Terminal => rpassword::prompt_password(format!("? {} ", message)),
        PasswordSource::Input => {
            write!(output, "? {} ", message).map_err(prompt_io_error)?;
            output.flush().map_err(prompt_io_error)?;
            rpassword::read_password_from_bufread(input)
        }
    };
    password.map_err(|e| SqlizerError::Config(format!("Failed to read password: {}", e)))
}

fn prompt_io_error(e: std::io::Error) -> SqlizerError {
    SqlizerError::Config(format!("Prompt failed: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn answer(script: &str) -> (Result<InitAnswers, SqlizerError>, String) {
        let mut input = Cursor::new(script.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = ask_init_answers(&mut input, &mut output, PasswordSource::Input);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_all_answers() {
        let (result, output) = answer("sql01\n1444\nsa\nsecret\n");

        assert_eq!(
            result.unwrap(),
            InitAnswers {
                host: "sql01".to_string(),
                port: 1444,
                user: "sa".to_string(),
                password: "secret".to_string(),
            }
        );
        assert!(output.contains("Enter the host name for your SQL Server instance"));
        assert!(output.contains("Target database pass?"));
    }

    #[test]
    fn test_defaults_for_host_and_port() {
        let (result, _) = answer("\n\nsa\nsecret\n");
        let answers = result.unwrap();

        assert_eq!(answers.host, "localhost");
        assert_eq!(answers.port, 1433);
    }

    #[test]
    fn test_invalid_port_is_asked_again() {
        let (result, output) = answer("sql01\nabc\n1433\nsa\nsecret\n");

        assert_eq!(result.unwrap().port, 1433);
        assert!(output.contains("'abc' is not a valid port number"));
    }

    #[test]
    fn test_empty_user_is_asked_again() {
        let (result, output) = answer("sql01\n1433\n\nsa\nsecret\n");

        assert_eq!(result.unwrap().user, "sa");
        assert!(output.contains("A user is required"));
    }

    #[test]
    fn test_password_is_not_trimmed_or_defaulted() {
        let (result, output) = answer("sql01\n1433\nsa\n  pa ss \n");

        assert_eq!(result.unwrap().password, "  pa ss ");
        assert!(output.ends_with("? Target database pass? "));
    }

    #[test]
    fn test_password_cut_off_is_error() {
        let (result, _) = answer("sql01\n1433\nsa\n");
        assert!(matches!(result, Err(SqlizerError::Config(_))));
    }

    #[test]
    fn test_early_end_of_input() {
        let (result, _) = answer("sql01\n");
        assert!(matches!(result, Err(SqlizerError::Config(_))));
    }

    #[test]
    fn test_into_config_file() {
        let file = InitAnswers {
            host: "sql01".to_string(),
            port: 1433,
            user: "sa".to_string(),
            password: "secret".to_string(),
        }
        .into_config_file();

        assert_eq!(file.server.user.as_deref(), Some("sa"));
        assert_eq!(file.server.password.as_deref(), Some("secret"));
    }
}
