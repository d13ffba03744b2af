use clap::Parser;
use fetchmoodle_lib::{CourseId, Fetcher};
use log::{debug, error};
use serde::Serialize;

use crate::options::{Command, Options};

mod logging;
mod options;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    logging::init_logger();

    if let Err(err) = run(Options::parse()).await {
        let mut message = err.to_string();
        let mut source = std::error::Error::source(&err);
        while let Some(cause) = source {
            message.push_str(&format!(": {cause}"));
            source = cause.source();
        }

        error!("{message}");
        std::process::exit(1);
    }
}

async fn run(args: Options) -> Result<(), Error> {
    let mut fetcher = Fetcher::new();
    fetcher
        .login(&args.url, &args.username, &args.password)
        .await?;
    debug!("logged in as {}", args.username);

    let result = match &args.command {
        Command::Grades => to_json(&fetcher.get_grades().await?, args.pretty),
        Command::Courses => to_json(&fetcher.get_courses().await?, args.pretty),
        Command::Course { course } => {
            let course = match course.trim().parse::<u32>() {
                Ok(id) => CourseId::new(id),
                Err(_) => course.parse::<CourseId>()?,
            };
            to_json(&fetcher.get_course_by_id(course.get()).await?, args.pretty)
        }
        Command::Recent => to_json(&fetcher.get_recent_items().await?, args.pretty),
        Command::Timeline => to_json(&fetcher.get_timeline().await?, args.pretty),
        Command::Profile => to_json(&fetcher.get_user_profile().await?, args.pretty),
    }?;
    println!("{result}");

    fetcher.logout();
    Ok(())
}

fn to_json<T: Serialize>(value: &T, pretty: bool) -> Result<String, Error> {
    Ok(match pretty {
        true => serde_json::to_string_pretty(value)?,
        false => serde_json::to_string(value)?,
    })
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Moodle(#[from] fetchmoodle_lib::Error),
    #[error(transparent)]
    InvalidCourse(#[from] fetchmoodle_lib::ParseIdError),
    #[error(transparent)]
    JsonSerializeFailed(#[from] serde_json::Error),
}
