//! Console questionnaire that collects a [`CustomerProfile`], plus score rendering.

use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::advisor::percent;
use crate::profile::{CustomerProfile, IncomeBracket, LifeEvent, MAX_AGE, MIN_AGE, MaritalStatus};
use crate::recommend::Recommendation;

/// Reads one trimmed, lowercased line. `None` on end of input.
fn ask<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<Option<String>> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_lowercase()))
}

fn ask_age<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Option<u32>> {
    loop {
        let Some(answer) = ask(input, out, "What is your age? ")? else {
            return Ok(None);
        };
        match answer.parse::<u32>() {
            Ok(age) if (MIN_AGE..MAX_AGE).contains(&age) => return Ok(Some(age)),
            Ok(_) => writeln!(out, "Please enter an age between {MIN_AGE} and {}.", MAX_AGE - 1)?,
            Err(_) => writeln!(out, "Please enter a valid number.")?,
        }
    }
}

fn ask_choice<T, R, W>(input: &mut R, out: &mut W, question: &str, options: &str) -> io::Result<Option<T>>
where
    T: FromStr,
    R: BufRead,
    W: Write,
{
    writeln!(out, "\nOptions: {options}")?;
    loop {
        let Some(answer) = ask(input, out, question)? else {
            return Ok(None);
        };
        match answer.parse::<T>() {
            Ok(value) => return Ok(Some(value)),
            Err(_) => writeln!(out, "Please choose from: {options}")?,
        }
    }
}

fn ask_yes_no<R: BufRead, W: Write>(input: &mut R, out: &mut W, question: &str) -> io::Result<Option<bool>> {
    loop {
        let Some(answer) = ask(input, out, question)? else {
            return Ok(None);
        };
        match answer.as_str() {
            "yes" | "y" => return Ok(Some(true)),
            "no" | "n" => return Ok(Some(false)),
            _ => writeln!(out, "Please answer 'yes' or 'no'.")?,
        }
    }
}

/// Asks every question in turn, re-asking until each answer is valid.
///
/// Returns `Ok(None)` if input ends before the profile is complete.
pub fn collect_profile<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> io::Result<Option<CustomerProfile>> {
    writeln!(out, "\n{}", "=".repeat(50))?;
    writeln!(out, "  Insurance Recommendation Chatbot")?;
    writeln!(out, "{}", "=".repeat(50))?;
    writeln!(out, "Please answer a few questions to get your personalized recommendation.\n")?;

    let Some(age) = ask_age(input, out)? else {
        return Ok(None);
    };
    let Some(marital_status) =
        ask_choice::<MaritalStatus, _, _>(input, out, "What is your marital status? ", &MaritalStatus::options())?
    else {
        return Ok(None);
    };
    let Some(has_kids) = ask_yes_no(input, out, "\nDo you have children? (yes/no): ")? else {
        return Ok(None);
    };
    let Some(income_bracket) =
        ask_choice::<IncomeBracket, _, _>(input, out, "What is your income bracket? ", &IncomeBracket::options())?
    else {
        return Ok(None);
    };
    let Some(life_event) = ask_choice::<LifeEvent, _, _>(
        input,
        out,
        "Have you experienced a recent life event? ",
        &LifeEvent::options(),
    )?
    else {
        return Ok(None);
    };

    Ok(Some(CustomerProfile {
        age,
        marital_status,
        has_kids,
        income_bracket,
        life_event,
    }))
}

/// One line per product: name, percentage and a 20-cell bar.
pub fn format_scores(recommendations: &[Recommendation]) -> String {
    recommendations
        .iter()
        .map(|r| {
            let cells = (r.confidence * 20.0).floor().max(0.0) as usize;
            format!("   {:<15} {:>4}  {}", r.insurance, percent(r.confidence), "█".repeat(cells))
        })
        .collect::<Vec<_>>()
        .join("\n")
}
