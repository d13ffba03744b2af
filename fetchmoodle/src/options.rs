use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Options {
    /// Root url of the Moodle site (e.g. https://moodle.school.example)
    #[arg(long, env = "MOODLE_URL")]
    pub url: String,
    /// Username to log in with
    #[arg(long, short, env = "MOODLE_USERNAME")]
    pub username: String,
    /// Password to log in with
    #[arg(long, short, env = "MOODLE_PASSWORD", hide_env_values = true)]
    pub password: String,
    /// Pretty print the JSON output
    #[arg(long)]
    pub pretty: bool,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Grades of every enrolled course
    Grades,
    /// Courses the user is enrolled in
    Courses,
    /// Sections and modules of a single course
    Course {
        /// Course id or `course/view.php?id=<id>` url
        course: String,
    },
    /// Recently accessed items
    Recent,
    /// Upcoming and recently overdue events
    Timeline,
    /// Name and picture of the user
    Profile,
}
