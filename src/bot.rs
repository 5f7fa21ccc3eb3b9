//! The reminder bot: daily timetable announcements, per-class reminders,
//! weekly prompts and question-form relaying, all driven by the timer runner.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, Weekday};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{error, info, warn};

use crate::config::{default_feedback_slot, default_question_slot, BotConfig, WeeklyPrompt};
use crate::curriculum::{Curriculum, Engine, Occurrence, ParityState, RunningSet, ShiftRule, SlotKey};
use crate::display::{class_reminder, feedback_prompt, morning_digest, question_prompt};
use crate::error::{Error, Result};
use crate::form::{relay_new_submissions, SubmissionSource};
use crate::notify::{Message, NotificationSink};
use crate::parser::{load_corpus, load_curricula, load_optional, load_shifts};
use crate::schedule::{next_daily, next_polling_slot, next_weekly, reminder_fire_at, JobHandler};
use crate::state::PersistedState;

/// Work the bot can be woken up for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Job {
    /// Daily cycle: resolve today's classes and announce them.
    Inform,
    /// "Starting soon" message for one class.
    ClassReminder(Occurrence),
    FeedbackPrompt,
    QuestionPrompt,
    SubmissionCheck,
}

impl Job {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Inform => "inform",
            Self::ClassReminder(_) => "class_reminder",
            Self::FeedbackPrompt => "feedback_prompt",
            Self::QuestionPrompt => "question_prompt",
            Self::SubmissionCheck => "submission_check",
        }
    }
}

type FollowUps = Vec<(DateTime<FixedOffset>, Job)>;

pub struct ReminderBot {
    config: BotConfig,
    state: PersistedState,
    parity: ParityState,
    running: RunningSet,
    /// Last timetable that loaded cleanly.
    curricula: Vec<Curriculum>,
    corpus: Vec<String>,
    /// Slots that already have a reminder queued.
    reminded: HashSet<SlotKey>,
    sink: Box<dyn NotificationSink>,
    submissions: Option<Box<dyn SubmissionSource>>,
    rng: StdRng,
}

impl ReminderBot {
    pub fn new(
        config: BotConfig,
        state: PersistedState,
        curricula: Vec<Curriculum>,
        corpus: Vec<String>,
        sink: Box<dyn NotificationSink>,
        started_on: NaiveDate,
    ) -> Self {
        let parity = ParityState::new(state.parity(), started_on, state.parity_flipped_on);
        Self {
            config,
            state,
            parity,
            running: RunningSet::new(),
            curricula,
            corpus,
            reminded: HashSet::new(),
            sink,
            submissions: None,
            rng: StdRng::from_entropy(),
        }
    }

    /// Loads the corpus, timetable and state named by `config`.
    ///
    /// A missing or empty corpus, a malformed timetable and a missing state
    /// file without `start_parity` are all fatal here.
    pub fn from_config(config: BotConfig, sink: Box<dyn NotificationSink>, today: NaiveDate) -> Result<Self> {
        let corpus = load_corpus(&config.corpus_path).map_err(|e| {
            Error::Config(format!("cannot load fallback corpus {}: {e}", config.corpus_path.display()))
        })?;
        if corpus.is_empty() {
            return Err(Error::Config(format!(
                "fallback corpus {} is empty",
                config.corpus_path.display()
            )));
        }
        let curricula = load_optional(&config.curricula_path, |p| load_curricula(p))?;
        let state = PersistedState::load_or_seed(&config.state_path, config.start_parity)?;
        info!(
            curricula = curricula.len(),
            corpus = corpus.len(),
            parity = %state.parity(),
            "bot initialized"
        );
        Ok(Self::new(config, state, curricula, corpus, sink, today))
    }

    pub fn with_submission_source(mut self, source: Box<dyn SubmissionSource>) -> Self {
        self.submissions = Some(source);
        self
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub fn state(&self) -> &PersistedState {
        &self.state
    }

    pub fn running(&self) -> &RunningSet {
        &self.running
    }

    /// First firing of every cadence job. In test mode all of them fire at `now`.
    pub fn initial_jobs(&self, now: DateTime<FixedOffset>, test_mode: bool) -> FollowUps {
        let first = |regular: DateTime<FixedOffset>| if test_mode { now } else { regular };

        let mut jobs = vec![(first(next_daily(now, self.config.inform_time)), Job::Inform)];
        if let Some(prompt) = &self.config.feedback {
            jobs.push((first(weekly_slot(now, prompt, default_feedback_slot())), Job::FeedbackPrompt));
        }
        if let Some(prompt) = &self.config.question {
            jobs.push((first(weekly_slot(now, prompt, default_question_slot())), Job::QuestionPrompt));
        }
        if self.submissions.is_some() {
            jobs.push((first(next_polling_slot(now, &self.config.submission_check)), Job::SubmissionCheck));
        } else {
            info!("no submission source, question form polling disabled");
        }
        jobs
    }

    fn deliver(&self, message: &Message) {
        match self.sink.send(message) {
            Ok(()) => info!(snapshot = %message.snapshot(), "message sent"),
            Err(e) => error!(error = %e, snapshot = %message.snapshot(), "failed to send message"),
        }
    }

    fn persist(&self) {
        if let Err(e) = self.state.save(&self.config.state_path) {
            error!(path = %self.config.state_path.display(), error = %e, "failed to save state");
        }
    }

    fn reload_curricula(&mut self) {
        match load_optional(&self.config.curricula_path, |p| load_curricula(p)) {
            Ok(curricula) => self.curricula = curricula,
            Err(e) => error!(error = %e, "timetable reload failed, keeping the previous one"),
        }
    }

    fn load_shift_rules(&self) -> Vec<ShiftRule> {
        load_optional(&self.config.shifts_path, |p| load_shifts(p)).unwrap_or_else(|e| {
            error!(error = %e, "shift table unreadable, applying no shifts");
            Vec::new()
        })
    }

    fn inform(&mut self, now: DateTime<FixedOffset>) -> FollowUps {
        let today = now.date_naive();
        self.reload_curricula();
        let shifts = self.load_shift_rules();

        let engine = Engine::new(&self.curricula, &shifts, self.config.shift_match);
        // The engine owns the running set for the cycle and hands back the pruned one.
        let running = std::mem::take(&mut self.running);
        let resolution = engine.resolve_today(today, &mut self.parity, running);
        self.running = resolution.running;

        if resolution.parity_flipped {
            self.state.is_single_week_now = self.parity.current.is_single();
            self.state.parity_flipped_on = self.parity.flipped_on;
            self.persist();
        }

        info!(date = %today, classes = resolution.today.len(), parity = %self.parity.current, "today resolved");

        if resolution.today.is_empty() {
            self.send_fallback();
        } else {
            self.deliver(&morning_digest(&resolution.today));
        }

        let mut follow_ups = Vec::new();
        // Earlier days' reminders have all fired; only today's slots can repeat.
        self.reminded.retain(|key| key.date >= today);
        for occ in resolution.today {
            if self.reminded.insert(occ.slot_key()) {
                let fire_at = reminder_fire_at(&occ, self.config.reminder_lead(), now);
                follow_ups.push((fire_at, Job::ClassReminder(occ)));
            }
        }
        follow_ups.push((next_daily(now, self.config.inform_time), Job::Inform));
        follow_ups
    }

    fn send_fallback(&mut self) {
        let Some(line) = self.corpus.choose(&mut self.rng).cloned() else {
            warn!("no classes today and the fallback corpus is empty");
            return;
        };
        self.deliver(&Message::text(line));
    }

    fn check_submissions(&mut self, now: DateTime<FixedOffset>) -> FollowUps {
        if let Some(source) = &self.submissions {
            match relay_new_submissions(source.as_ref(), self.sink.as_ref(), self.state.last_seen_submission) {
                Ok(report) => {
                    if report.pending > 0 {
                        warn!(pending = report.pending, "some submissions will be retried next check");
                    }
                    // Only persist when something was actually relayed.
                    if report.cursor != self.state.last_seen_submission {
                        self.state.last_seen_submission = report.cursor;
                        self.persist();
                    }
                }
                Err(e) => error!(error = %e, "failed to list submissions"),
            }
        }
        vec![(next_polling_slot(now, &self.config.submission_check), Job::SubmissionCheck)]
    }
}

fn weekly_slot(now: DateTime<FixedOffset>, prompt: &WeeklyPrompt, defaults: (Weekday, NaiveTime)) -> DateTime<FixedOffset> {
    let (weekday, time) = prompt.slot_or(defaults.0, defaults.1);
    next_weekly(now, weekday, time)
}

impl JobHandler<Job> for ReminderBot {
    fn handle(&mut self, job: Job, now: DateTime<FixedOffset>) -> FollowUps {
        match job {
            Job::Inform => self.inform(now),
            Job::ClassReminder(occ) => {
                self.deliver(&class_reminder(&occ));
                Vec::new()
            }
            Job::FeedbackPrompt => match self.config.feedback.clone() {
                Some(prompt) => {
                    self.deliver(&feedback_prompt(&prompt.link));
                    vec![(weekly_slot(now, &prompt, default_feedback_slot()), Job::FeedbackPrompt)]
                }
                None => Vec::new(),
            },
            Job::QuestionPrompt => match self.config.question.clone() {
                Some(prompt) => {
                    self.deliver(&question_prompt(&prompt.link));
                    vec![(weekly_slot(now, &prompt, default_question_slot()), Job::QuestionPrompt)]
                }
                None => Vec::new(),
            },
            Job::SubmissionCheck => self.check_submissions(now),
        }
    }
}
