extern crate activeftp;
extern crate env_logger;

use std::io::{self, BufRead, Write};

use activeftp::{FtpSession, LoginStatus, Outcome, Result};

/// Returns `None` once stdin is closed or unreadable.
fn prompt(text: &str) -> Option<String> {
    print!("{}", text);
    let _ = io::stdout().flush();
    let mut line = String::new();
    match io::stdin().lock().read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(line.trim().to_owned()),
    }
}

fn run(host: &str, port: u16, data_port: u16) -> Result<()> {
    let mut session = FtpSession::connect(host, port, data_port)?;

    let user = match prompt("Username: ") {
        Some(user) => user,
        None => return Ok(()),
    };
    if session.login_with_username(&user)? == LoginStatus::PasswordRequired {
        let pass = match prompt("Password: ") {
            Some(pass) => pass,
            None => return Ok(()),
        };
        session.login_with_password(&pass)?;
    }

    while session.is_logged_in() {
        let line = match prompt(&format!("{}> ", session.status_header())) {
            Some(line) => line,
            None => break,
        };
        if line.is_empty() {
            continue;
        }
        if line == "exit" {
            break;
        }

        let mut outcome = session.execute(&line);
        while let Ok(Outcome::ConfirmationRequired(pending)) = outcome {
            let answer = prompt(&format!("{} exists on the server, overwrite? [y/N] ", pending.remote_name()));
            let overwrite = answer.map_or(false, |a| a.eq_ignore_ascii_case("y"));
            outcome = session.resume_upload(pending, overwrite);
        }

        match outcome {
            Ok(Outcome::Output(text)) => print!("{}", text),
            Ok(Outcome::Failure(msg)) => println!("{}", msg),
            Ok(Outcome::Cancelled) => println!("cancelled"),
            Ok(_) => {}
            Err(err) => {
                if err.is_fatal() {
                    return Err(err);
                }
                println!("{}", err);
            }
        }
    }

    session.close();
    Ok(())
}

fn main() {
    env_logger::init();
    run("127.0.0.1", 6788, 6789).unwrap_or_else(|err| panic!("{}", err));
}
