use crate::prelude::*;

/// Prompt the user and read a single non-empty line from `stdin`.
pub(crate) async fn read_line(message: &str) -> Result<String> {
    show_prompt(message);

    // Tokio recommends spawning a blocking thread for user input
    // https://docs.rs/tokio/latest/tokio/io/struct.Stdin.html
    let user_input = tokio::task::spawn_blocking(move || {
        std::io::stdin()
            .lines()
            .next()
            .transpose()
            .context("Failed to read a line from `stdin`")?
            .context("Reached end-of-file (EOF) while reading from `stdin`")
    })
    .await
    .context("Failed to spawn blocking task for user input")??;

    let user_input = user_input.trim();

    if user_input.is_empty() {
        bail!("No input was provided");
    }

    Ok(user_input.to_owned())
}

/// Logged at `warn` level to stay visible when the log filter is raised
fn show_prompt(message: &str) {
    warn!("{message}");
}

/// Normalize a path that was typed or dragged and dropped into a terminal.
/// Terminals usually wrap such paths in quotes.
pub(crate) fn unquote_path(input: &str) -> &str {
    input.trim().trim_matches(&['"', '\''][..]).trim()
}
