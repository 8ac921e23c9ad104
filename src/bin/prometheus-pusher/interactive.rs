use dialoguer::theme::SimpleTheme;
use dialoguer::{Confirm, Input};
use std::io;

pub fn user_input(prompt: impl Into<String>) -> io::Result<String> {
    Input::with_theme(&SimpleTheme)
        .with_prompt(prompt)
        .interact_text()
}

pub fn user_input_optional(prompt: impl Into<String>) -> io::Result<Option<String>> {
    let input: String = Input::with_theme(&SimpleTheme)
        .with_prompt(prompt)
        .allow_empty(true)
        .interact_text()?;

    Ok(if input.is_empty() { None } else { Some(input) })
}

pub fn confirm(prompt: impl Into<String>) -> io::Result<bool> {
    Confirm::with_theme(&SimpleTheme)
        .with_prompt(prompt)
        .interact()
}

pub fn confirm_optional(prompt: impl Into<String>) -> io::Result<Option<bool>> {
    Confirm::with_theme(&SimpleTheme)
        .with_prompt(prompt)
        .interact_opt()
}
