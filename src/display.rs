use crate::calendar::format_clock;
use crate::curriculum::Occurrence;
use crate::form::Submission;
use crate::notify::Message;

/// Formats a course name, flagging moved classes
pub fn format_course_name(occ: &Occurrence) -> String {
    if occ.shifted {
        format!("{} (shifted)", occ.name)
    } else {
        occ.name.clone()
    }
}

/// Formats "[teacher][place, HH:MM - HH:MM]"
pub fn format_slot(occ: &Occurrence) -> String {
    format!(
        "[{}][{}, {} - {}]",
        occ.teacher,
        occ.place,
        format_clock(occ.start),
        format_clock(occ.end)
    )
}

/// Formats one numbered entry of the morning digest
pub fn format_digest_entry(index: usize, occ: &Occurrence) -> String {
    format!(
        "{}. {}{}\nStudents: {}\n",
        index + 1,
        format_course_name(occ),
        format_slot(occ),
        occ.students.join(", ")
    )
}

/// Morning message listing every class of the day, mentioning everyone.
pub fn morning_digest(today: &[Occurrence]) -> Message {
    let entries: Vec<String> = today
        .iter()
        .enumerate()
        .map(|(i, occ)| format_digest_entry(i, occ))
        .collect();
    let noun = if today.len() == 1 { "class" } else { "classes" };
    Message::text(format!(
        "Good morning! There {} {} {} today:\n\n{}\nPlease be on time!",
        if today.len() == 1 { "is" } else { "are" },
        today.len(),
        noun,
        entries.join("\n")
    ))
    .with_mention_all()
}

/// Reminder sent shortly before a class starts.
pub fn class_reminder(occ: &Occurrence) -> Message {
    Message::text(format!(
        "Class: {}{} starts soon, teachers and students please don't forget!",
        format_course_name(occ),
        format_slot(occ)
    ))
}

pub fn feedback_prompt(link: &str) -> Message {
    Message::text(format!(
        "All classes for this week are over!\nPlease share your feedback on this week's classes:\n{link}"
    ))
}

pub fn question_prompt(link: &str) -> Message {
    Message::text(format!(
        "The weekend is here, hope everyone had a fulfilling week!\n\
         Ran into any new questions? Ask any time:\n{link}\nHave a nice weekend!"
    ))
}

/// Relays one form submission as markdown.
pub fn submission_message(submission: &Submission, content: &str) -> Message {
    let title = format!("[Q&A] {}", submission.timestamp.format("%Y-%m-%d %H:%M:%S"));
    let body = format!(
        "{}\n\nOriginal link: [link]({})",
        content.replace("\r\n", "\n").trim_end(),
        submission.link
    );
    Message::markdown(title, body)
}
