//! HTML templates for each notification kind.
//!
//! Every interpolated value goes through [`escape_html`]. All templates share
//! the same layout and signature block.

use crate::models::application::{ApplicationStatus, JobApplication};
use crate::notifications::{Notification, NotificationSettings};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

pub fn render(notification: &Notification, settings: &NotificationSettings) -> RenderedEmail {
    match notification {
        Notification::HrNewApplication { application } => hr_new_application(application, settings),
        Notification::ApplicantConfirmation { application } => {
            applicant_confirmation(application, settings)
        }
        Notification::StatusUpdate {
            application,
            previous,
        } => status_update(application, *previous, settings),
        Notification::Custom {
            applicant_name,
            subject,
            message,
        } => custom(applicant_name, subject, message, settings),
    }
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Escapes and turns line breaks into `<br>`.
fn paragraphs(text: &str) -> String {
    escape_html(text).replace("\r\n", "\n").replace('\n', "<br>")
}

fn layout(heading: &str, body: &str, settings: &NotificationSettings) -> String {
    format!(
        r#"<!DOCTYPE html>
<html>
<body style="margin:0;padding:0;background:#f4f5f7;font-family:Arial,Helvetica,sans-serif;color:#1f2933;">
  <table role="presentation" width="100%" cellpadding="0" cellspacing="0">
    <tr><td align="center" style="padding:24px;">
      <table role="presentation" width="600" cellpadding="0" cellspacing="0" style="background:#ffffff;border-radius:8px;">
        <tr><td style="padding:24px 32px;border-bottom:1px solid #e4e7eb;">
          <h1 style="margin:0;font-size:20px;">{heading}</h1>
        </td></tr>
        <tr><td style="padding:24px 32px;font-size:15px;line-height:1.6;">
          {body}
        </td></tr>
        <tr><td style="padding:16px 32px 24px;">
          {signature}
        </td></tr>
      </table>
    </td></tr>
  </table>
</body>
</html>"#,
        heading = escape_html(heading),
        body = body,
        signature = signature(settings),
    )
}

fn signature(settings: &NotificationSettings) -> String {
    format!(
        r#"<p style="margin:0;font-size:14px;color:#52606d;">Best regards,<br><strong>{company}</strong><br><a href="{site}" style="color:#2563eb;">{site}</a></p>
          <p style="margin:12px 0 0;font-size:12px;color:#9aa5b1;">This is an automated message from {company}. Please do not reply directly to this email.</p>"#,
        company = escape_html(&settings.company_name),
        site = escape_html(&settings.frontend_url),
    )
}

fn detail_row(label: &str, value: &str) -> String {
    format!(
        r#"<tr><td style="padding:4px 12px 4px 0;color:#52606d;">{}</td><td style="padding:4px 0;">{}</td></tr>"#,
        escape_html(label),
        escape_html(value)
    )
}

fn hr_new_application(app: &JobApplication, settings: &NotificationSettings) -> RenderedEmail {
    let mut rows = vec![
        detail_row("Name", &app.full_name()),
        detail_row("Email", &app.email),
        detail_row("Phone", &app.phone),
        detail_row("Position", &app.job_title),
        detail_row("Experience", app.experience.as_str()),
        detail_row("Location", &app.current_location),
        detail_row(
            "Willing to relocate",
            if app.willing_to_relocate { "Yes" } else { "No" },
        ),
        detail_row("Skills", &app.skills.join(", ")),
    ];
    if let Some(current) = &app.current_position {
        rows.push(detail_row("Current position", current));
    }
    if let Some(salary) = &app.expected_salary {
        rows.push(detail_row("Expected salary", salary));
    }
    if let Some(portfolio) = &app.portfolio_url {
        rows.push(detail_row("Portfolio", portfolio));
    }

    let resume_link = app
        .resume_url
        .as_deref()
        .map(|url| {
            format!(
                r#"<p><a href="{}" style="color:#2563eb;">Download resume</a></p>"#,
                escape_html(url)
            )
        })
        .unwrap_or_default();

    let admin_link = format!(
        "{}/admin/applications/{}",
        settings.frontend_url, app.id
    );

    let body = format!(
        r#"<p>A new application has been submitted for <strong>{title}</strong>.</p>
          <table role="presentation" cellpadding="0" cellspacing="0">{rows}</table>
          {resume_link}
          <p><a href="{admin_link}" style="display:inline-block;padding:10px 18px;background:#2563eb;color:#ffffff;border-radius:6px;text-decoration:none;">Review application</a></p>"#,
        title = escape_html(&app.job_title),
        rows = rows.concat(),
        resume_link = resume_link,
        admin_link = escape_html(&admin_link),
    );

    RenderedEmail {
        subject: format!("New application: {} for {}", app.full_name(), app.job_title),
        html: layout("New job application", &body, settings),
    }
}

fn applicant_confirmation(app: &JobApplication, settings: &NotificationSettings) -> RenderedEmail {
    let body = format!(
        r#"<p>Dear {name},</p>
          <p>Thank you for applying for the <strong>{title}</strong> position at {company}. We have received your application and our team will review it carefully.</p>
          <p>If your profile matches our requirements, we will contact you about the next steps. You will also receive an email whenever the status of your application changes.</p>
          <p style="font-size:13px;color:#52606d;">Application reference: {id}</p>"#,
        name = escape_html(&app.first_name),
        title = escape_html(&app.job_title),
        company = escape_html(&settings.company_name),
        id = app.id,
    );

    RenderedEmail {
        subject: format!("Application received: {}", app.job_title),
        html: layout("Thank you for your application", &body, settings),
    }
}

/// Status-specific heading and paragraph.
fn status_copy(status: ApplicationStatus, job_title: &str) -> (&'static str, String) {
    let title = escape_html(job_title);
    match status {
        ApplicationStatus::Pending => (
            "Your application is pending",
            format!("Your application for <strong>{title}</strong> is in our queue and will be reviewed soon."),
        ),
        ApplicationStatus::Reviewing => (
            "Your application is under review",
            format!("Good news: our hiring team has started reviewing your application for <strong>{title}</strong>."),
        ),
        ApplicationStatus::Shortlisted => (
            "You have been shortlisted",
            format!("Congratulations! You have been shortlisted for <strong>{title}</strong>. We will be in touch shortly about the next steps."),
        ),
        ApplicationStatus::InterviewScheduled => (
            "Your interview is being scheduled",
            format!("We would like to interview you for <strong>{title}</strong>. A member of our team will contact you with the details."),
        ),
        ApplicationStatus::Interviewed => (
            "Thank you for interviewing with us",
            format!("Thank you for taking the time to interview for <strong>{title}</strong>. We are completing our evaluation and will update you soon."),
        ),
        ApplicationStatus::Selected => (
            "Congratulations!",
            format!("We are delighted to let you know that you have been selected for <strong>{title}</strong>. Our team will contact you with the offer details."),
        ),
        ApplicationStatus::Rejected => (
            "Update on your application",
            format!("Thank you for your interest in <strong>{title}</strong>. After careful consideration, we have decided not to move forward with your application at this time. We encourage you to apply for future openings that match your profile."),
        ),
        ApplicationStatus::Withdrawn => (
            "Your application has been withdrawn",
            format!("Your application for <strong>{title}</strong> has been withdrawn. If this was not intended, please reach out to us."),
        ),
    }
}

fn status_update(
    app: &JobApplication,
    previous: ApplicationStatus,
    settings: &NotificationSettings,
) -> RenderedEmail {
    let (heading, paragraph) = status_copy(app.status, &app.job_title);
    let body = format!(
        r#"<p>Dear {name},</p>
          <p>{paragraph}</p>
          <p style="font-size:13px;color:#52606d;">Status: {previous} &rarr; <strong>{current}</strong></p>"#,
        name = escape_html(&app.first_name),
        paragraph = paragraph,
        previous = escape_html(previous.label()),
        current = escape_html(app.status.label()),
    );

    RenderedEmail {
        subject: format!("Application update: {}", app.job_title),
        html: layout(heading, &body, settings),
    }
}

fn custom(
    applicant_name: &str,
    subject: &str,
    message: &str,
    settings: &NotificationSettings,
) -> RenderedEmail {
    let body = format!(
        "<p>Dear {},</p>\n          <p>{}</p>",
        escape_html(applicant_name),
        paragraphs(message)
    );
    RenderedEmail {
        subject: subject.to_string(),
        html: layout(subject, &body, settings),
    }
}
