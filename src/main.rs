use std::io::Write;
use std::path::Path;

use intake_client::{ClientConfig, Doctor, IntakeClient};
use intake_core::responses::{BodyMarking, ResponseKey, ResponseValue};
use intake_core::template::{ControlKind, QuestionConfig, QuestionItem};
use intake_core::{IntakeError, IntakeSession, Language};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the intake wizard driver
///
/// Runs one interactive fill-out session in the terminal: fetches the
/// template, walks the patient through the filtered question sequence,
/// and submits the assembled response. All engine state lives in
/// `IntakeSession`; this binary only renders prompts and relays input.
///
/// # Environment Variables
/// - `INTAKE_API_BASE`: Collaborator base URL (default: "http://localhost:3000")
/// - `INTAKE_API_KEY`: Optional API key sent as x-api-key
/// - `INTAKE_TEMPLATE_ID`: Template to fill out (required)
///
/// # Returns
/// * `Ok(())` - Session finished (submitted or quit)
/// * `Err(anyhow::Error)` - Startup or fatal session failure
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("intake=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ClientConfig::from_env_values(
        std::env::var("INTAKE_API_BASE").ok(),
        std::env::var("INTAKE_API_KEY").ok(),
    )?;
    let template_id = std::env::var("INTAKE_TEMPLATE_ID")
        .map_err(|_| anyhow::anyhow!("INTAKE_TEMPLATE_ID must be set"))?;

    let client = IntakeClient::new(config);

    tracing::info!(%template_id, "fetching template");
    let raw = client.fetch_template(&template_id).await?;
    let mut session = IntakeSession::from_raw(raw)?;

    // Best-effort: the wizard still runs if the directory is down, the
    // patient just types a doctor id by hand.
    let doctors = match client.fetch_doctor_directory().await {
        Ok(doctors) => doctors,
        Err(e) => {
            tracing::warn!("doctor directory unavailable: {}", e);
            Vec::new()
        }
    };

    if session.current_item().is_none() {
        println!("This template has no steps to fill out.");
        return Ok(());
    }

    println!("== {} ==", session.template().title);
    println!("Commands: Enter=next  b=back  e=edit  l=language  s=submit  q=quit");

    loop {
        let item = match session.current_item() {
            Some(item) => item.clone(),
            None => break,
        };
        let (position, total) = session.step().expect("sequence is non-empty");

        println!();
        println!("-- Step {} of {} --", position + 1, total);
        render(&item);

        if !session.responses().has_content(&item.id) && !session.attachments().has_files(&item.id)
        {
            capture(&mut session, &item, &doctors);
        }

        let command = prompt("> ");
        match command.as_str() {
            "q" => {
                println!("Session abandoned; nothing was submitted.");
                return Ok(());
            }
            "b" => {
                if !session.previous() {
                    println!("Already on the first step.");
                }
            }
            "l" => {
                let next = match session.language() {
                    Language::Primary => Language::Alternate,
                    Language::Alternate => Language::Primary,
                };
                session.set_language(next);
                println!("Language switched; starting from the top.");
            }
            "e" => capture(&mut session, &item, &doctors),
            "s" => {
                if !session.is_terminal() {
                    println!("Submit is only available on the last step.");
                    continue;
                }
                // Awaiting the calls serialises submission: no further
                // input is accepted while a request is outstanding.
                match try_submit(&session, &client).await {
                    Ok(patient_id) => {
                        println!("Submitted successfully.");
                        if let Some(id) = patient_id {
                            println!("Patient record: {}", id);
                        }
                        return Ok(());
                    }
                    Err(message) => println!("{}", message),
                }
            }
            _ => match session.next() {
                Ok(true) => {}
                Ok(false) => println!("Last step: press 's' to submit."),
                Err(IntakeError::Validation(violation)) => println!("{}", violation),
                Err(e) => println!("{}", e),
            },
        }
    }

    Ok(())
}

/// Runs the terminal-step assembly and two-phase submission, mapping every
/// recoverable failure to a message. Session state is never touched, so
/// the caller can retry.
async fn try_submit(session: &IntakeSession, client: &IntakeClient) -> Result<Option<String>, String> {
    let draft = session.assemble_submission().map_err(|e| e.to_string())?;

    match client
        .submit(draft, session.attachments(), chrono::Utc::now())
        .await
    {
        Ok(outcome) => Ok(outcome.patient_id),
        Err(e) => Err(format!("{} (your answers are kept, you can retry)", e)),
    }
}

fn render(item: &QuestionItem) {
    println!("{}", item.question_text);
    if let Some(instructions) = &item.instructions {
        println!("  ({})", instructions);
    }
}

/// Per-variant input capture. Blank input leaves existing answers alone.
fn capture(session: &mut IntakeSession, item: &QuestionItem, doctors: &[Doctor]) {
    let id = item.id.clone();
    match &item.config {
        QuestionConfig::Section => {}

        QuestionConfig::OpenAnswer | QuestionConfig::SmartEditor => {
            let text = prompt("Answer: ");
            if !text.is_empty() {
                store(session, &id, ResponseKey::Whole, ResponseValue::Text(text));
            }
        }

        QuestionConfig::Date => loop {
            let text = prompt("Date (YYYY-MM-DD): ");
            if text.is_empty() {
                break;
            }
            match session.capture_date(&id, &text) {
                Ok(()) => break,
                Err(e) => println!("{}", e),
            }
        },

        QuestionConfig::ESignature => {
            let name = prompt("Type your full name to sign: ");
            if !name.is_empty() {
                store(session, &id, ResponseKey::Whole, ResponseValue::Text(name));
            }
        }

        QuestionConfig::Demographics(config) => {
            for field in &config.fields {
                if field.name == intake_core::template::ASSIGNED_DOCTOR_FIELD
                    && !doctors.is_empty()
                {
                    for (index, doctor) in doctors.iter().enumerate() {
                        println!(
                            "  {}. {} {} ({})",
                            index + 1,
                            doctor.first_name,
                            doctor.last_name,
                            doctor.id
                        );
                    }
                    let choice = prompt(&format!("{} (number or id): ", field.label));
                    if choice.is_empty() {
                        continue;
                    }
                    let doctor_id = choice
                        .parse::<usize>()
                        .ok()
                        .and_then(|number| doctors.get(number.saturating_sub(1)))
                        .map(|doctor| doctor.id.clone())
                        .unwrap_or(choice);
                    store(
                        session,
                        &id,
                        ResponseKey::Field(field.name.clone()),
                        ResponseValue::Text(doctor_id),
                    );
                    continue;
                }

                let value = prompt(&format!("{}: ", field.label));
                if !value.is_empty() {
                    store(
                        session,
                        &id,
                        ResponseKey::Field(field.name.clone()),
                        ResponseValue::Text(value),
                    );
                }
            }
        }

        QuestionConfig::PrimaryInsurance(config) | QuestionConfig::SecondaryInsurance(config) => {
            for field in &config.fields {
                let value = prompt(&format!("{}: ", field.label));
                if !value.is_empty() {
                    store(
                        session,
                        &id,
                        ResponseKey::Field(field.name.clone()),
                        ResponseValue::Text(value),
                    );
                }
            }
        }

        QuestionConfig::MultipleChoiceSingle(config) => {
            print_options(&config.options);
            if let Some(option) = pick_one(&config.options) {
                store(session, &id, ResponseKey::Whole, ResponseValue::Selection(option));
            }
        }

        QuestionConfig::MultipleChoiceMultiple(config) => {
            print_options(&config.options);
            let picked = pick_many(&config.options);
            if !picked.is_empty() {
                store(session, &id, ResponseKey::Whole, ResponseValue::Selections(picked));
            }
        }

        QuestionConfig::Matrix(config) => {
            print_options(&config.columns);
            for (row_index, row) in config.rows.iter().enumerate() {
                let input = prompt(&format!("{} (numbers, comma-separated): ", row));
                for col_index in parse_numbers(&input, config.columns.len()) {
                    store(
                        session,
                        &id,
                        ResponseKey::Cell {
                            row: row_index,
                            col: col_index,
                        },
                        ResponseValue::Selection(config.columns[col_index].clone()),
                    );
                }
            }
        }

        QuestionConfig::MatrixSingleAnswer(config) => {
            print_options(&config.columns);
            for (row_index, row) in config.rows.iter().enumerate() {
                let input = prompt(&format!("{} (number): ", row));
                if let Some(col_index) = parse_numbers(&input, config.columns.len()).first() {
                    store(
                        session,
                        &id,
                        ResponseKey::Row(row_index),
                        ResponseValue::Selection(config.columns[*col_index].clone()),
                    );
                }
            }
        }

        QuestionConfig::FileAttachment(policy) => loop {
            let path = prompt("File path (blank to finish): ");
            if path.is_empty() {
                break;
            }
            match session
                .attachments_mut()
                .add_from_path(&id, Path::new(&path), policy)
            {
                Ok(file) => println!("Attached {} ({} bytes).", file.filename, file.size_bytes),
                Err(e) => println!("{}", e),
            }
        },

        QuestionConfig::BodyMap(config) => {
            if config.markings_enabled {
                let mut markings = Vec::new();
                loop {
                    let input = prompt("Marking as 'x y' in 0..1 (blank to finish): ");
                    if input.is_empty() {
                        break;
                    }
                    let mut parts = input.split_whitespace();
                    match (
                        parts.next().and_then(|x| x.parse::<f64>().ok()),
                        parts.next().and_then(|y| y.parse::<f64>().ok()),
                    ) {
                        (Some(x), Some(y)) => markings.push(BodyMarking {
                            view: config.diagram.clone(),
                            x,
                            y,
                        }),
                        _ => println!("Expected two numbers, e.g. '0.4 0.7'."),
                    }
                }
                if !markings.is_empty() {
                    store(
                        session,
                        &id,
                        ResponseKey::Field("markings".to_string()),
                        ResponseValue::Markings(markings),
                    );
                }
            }
            let description = prompt("Describe the area of concern: ");
            if !description.is_empty() {
                store(
                    session,
                    &id,
                    ResponseKey::Field("description".to_string()),
                    ResponseValue::Text(description),
                );
            }
        }

        QuestionConfig::MixedControls(config) => {
            for (index, control) in config.controls.iter().enumerate() {
                let value = match &control.kind {
                    ControlKind::Text => prompt(&format!("{}: ", control.label)),
                    ControlKind::Date => prompt(&format!("{} (YYYY-MM-DD): ", control.label)),
                    ControlKind::Checkbox => {
                        let answer = prompt(&format!("{} (y/n): ", control.label));
                        match answer.as_str() {
                            "y" | "yes" => "true".to_string(),
                            "n" | "no" => "false".to_string(),
                            _ => String::new(),
                        }
                    }
                    ControlKind::Dropdown(options) => {
                        println!("{}:", control.label);
                        print_options(options);
                        pick_one(options).unwrap_or_default()
                    }
                };
                if !value.is_empty() {
                    store(
                        session,
                        &id,
                        ResponseKey::Control(index),
                        ResponseValue::Text(value),
                    );
                }
            }
        }
    }
}

fn store(session: &mut IntakeSession, id: &str, key: ResponseKey, value: ResponseValue) {
    if let Err(e) = session.responses_mut().set(id, key, value) {
        println!("{}", e);
    }
}

fn print_options(options: &[String]) {
    for (index, option) in options.iter().enumerate() {
        println!("  {}. {}", index + 1, option);
    }
}

fn pick_one(options: &[String]) -> Option<String> {
    let input = prompt("Choice (number): ");
    parse_numbers(&input, options.len())
        .first()
        .map(|&index| options[index].clone())
}

fn pick_many(options: &[String]) -> Vec<String> {
    let input = prompt("Choices (numbers, comma-separated): ");
    parse_numbers(&input, options.len())
        .into_iter()
        .map(|index| options[index].clone())
        .collect()
}

/// Parses 1-based numbers out of comma-separated input, dropping anything
/// out of range.
fn parse_numbers(input: &str, len: usize) -> Vec<usize> {
    input
        .split(',')
        .filter_map(|part| part.trim().parse::<usize>().ok())
        .filter_map(|number| number.checked_sub(1))
        .filter(|&index| index < len)
        .collect()
}

fn prompt(text: &str) -> String {
    print!("{}", text);
    std::io::stdout().flush().ok();
    let mut line = String::new();
    std::io::stdin().read_line(&mut line).ok();
    line.trim().to_string()
}
