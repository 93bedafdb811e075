/*!
What each kind of user sees on their dashboard for a given week.

Everything here only reads from the `Store`.
*/
use std::collections::BTreeSet;

use serde::Serialize;
use time::UtcOffset;

use crate::sched::{AssignmentRow, EventRow, Slot};
use crate::store::{DbError, Store};
use crate::user::{Identity, Role};
use crate::week::Week;

/// A student's own group's timetable, and the homework and events that
/// concern them this week.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentView {
    pub schedule: Vec<Slot>,
    pub assignments: Vec<AssignmentRow>,
    pub events: Vec<EventRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherView {
    /// Every group's timetable.
    pub schedule: Vec<Slot>,
    /// Distinct groups appearing in `schedule`, sorted.
    pub groups: Vec<String>,
    pub my_subject: Option<String>,
    /// Only the ones this teacher set.
    pub assignments: Vec<AssignmentRow>,
    pub events: Vec<EventRow>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminView {
    pub schedule: Vec<Slot>,
    pub events: Vec<EventRow>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Dashboard {
    Student(StudentView),
    Teacher(TeacherView),
    Admin(AdminView),
}

impl Dashboard {
    /// Name of the template that renders this view.
    pub fn template(&self) -> &'static str {
        match self {
            Dashboard::Student(_) => "dashboard_student",
            Dashboard::Teacher(_) => "dashboard_teacher",
            Dashboard::Admin(_) => "dashboard_admin",
        }
    }
}

fn distinct_groups(slots: &[Slot]) -> Vec<String> {
    let set: BTreeSet<&str> = slots.iter()
        .map(|s| s.group_name.as_str())
        .collect();
    set.into_iter().map(str::to_owned).collect()
}

async fn student_view(
    store: &Store,
    group: &str,
    week: &Week,
    local: UtcOffset,
) -> Result<StudentView, DbError> {
    let schedule = store.get_slots(Some(group)).await?;
    let slot_ids: Vec<i64> = schedule.iter().map(|s| s.id).collect();

    let assignments = store.get_assignments_for_slots_due(
        &slot_ids, week.start_instant(local), week.end_instant(local)
    ).await?;
    let events = store.get_events_for_group_between(
        &slot_ids, group, week.start, week.end
    ).await?;

    Ok(StudentView { schedule, assignments, events })
}

async fn teacher_view(
    store: &Store,
    who: &Identity,
    week: &Week,
    local: UtcOffset,
) -> Result<TeacherView, DbError> {
    let schedule = store.get_slots(None).await?;
    let groups = distinct_groups(&schedule);
    let assignments = store.get_assignments_by_author_due(
        who.id, week.start_instant(local), week.end_instant(local)
    ).await?;
    let events = store.get_events_between(week.start, week.end).await?;

    Ok(TeacherView {
        schedule, groups, assignments, events,
        my_subject: who.subject.clone(),
    })
}

async fn admin_view(store: &Store, week: &Week) -> Result<AdminView, DbError> {
    let schedule = store.get_slots(None).await?;
    let events = store.get_events_between(week.start, week.end).await?;

    Ok(AdminView { schedule, events })
}

/**
Gather `who`'s dashboard for `week`. Due dates are compared against the
week as it runs in `local` time.

Returns `Ok(None)` if `who` lacks what their role needs to build a view
(a student without a group); callers should treat that as not being
allowed in.
*/
pub async fn aggregate(
    store: &Store,
    who: &Identity,
    week: &Week,
    local: UtcOffset,
) -> Result<Option<Dashboard>, DbError> {
    log::trace!(
        "aggregate( [ Store ], {} {}, {:?}, {} ) called.",
        &who.role, &who.id, week, &local
    );

    let dash = match who.role {
        Role::Student => match who.group_name.as_deref() {
            Some(group) if !group.is_empty() => Dashboard::Student(
                student_view(store, group, week, local).await?
            ),
            _ => {
                log::warn!("Student {} has no group; no dashboard.", &who.id);
                return Ok(None);
            },
        },
        Role::Teacher => Dashboard::Teacher(
            teacher_view(store, who, week, local).await?
        ),
        Role::Admin => Dashboard::Admin(admin_view(store, week).await?),
    };

    Ok(Some(dash))
}

#[cfg(test)]
mod tests {
    use super::*;

    use serial_test::serial;
    use time::{Duration, macros::{date, offset, time}};

    use crate::sched::{Day, NewAssignment, NewEvent};
    use crate::store::tests::{add_slot, add_user, fresh_store};

    fn slot(id: i64, group: &str) -> Slot {
        Slot {
            id,
            day_of_week: Day::Mon,
            start_time: time!(9:00),
            end_time: time!(10:30),
            subject: "Physics".to_owned(),
            group_name: group.to_owned(),
            room: None,
            teacher_name: None,
        }
    }

    fn event(title: &str, date: time::Date, slot: Option<i64>, group: Option<&str>) -> NewEvent {
        NewEvent {
            title: title.to_owned(),
            description: None,
            date,
            start_time: time!(12:00),
            end_time: time!(13:00),
            schedule_id: slot,
            group_name: group.map(str::to_owned),
        }
    }

    #[test]
    fn groups_sorted_and_distinct() {
        let slots = vec![
            slot(1, "4051"), slot(2, "1011"), slot(3, "4051"), slot(4, "3011"),
        ];
        assert_eq!(distinct_groups(&slots), vec!["1011", "3011", "4051"]);
        assert!(distinct_groups(&[]).is_empty());
    }

    #[tokio::test]
    #[serial]
    async fn groupless_student_gets_nothing() {
        let db = fresh_store().await;

        let who = add_user(&db, Role::Student, "anna", None).await.identity();
        let week = Week::containing(date!(2024-03-13), 0).unwrap();
        assert!(aggregate(&db, &who, &week, offset!(UTC)).await.unwrap().is_none());
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn views_are_scoped_by_role() {
        let db = fresh_store().await;

        let week = Week::containing(date!(2024-03-13), 0).unwrap();
        let local = offset!(+3);

        let student = add_user(&db, Role::Student, "anna", Some("3011")).await.identity();
        let author = add_user(&db, Role::Teacher, "petrov", None).await.identity();
        let other = add_user(&db, Role::Teacher, "ivanova", None).await.identity();
        let admin = add_user(&db, Role::Admin, "root", None).await.identity();

        let mine = add_slot(&db, Day::Mon, "3011").await;
        add_slot(&db, Day::Tue, "3011").await;
        let theirs = add_slot(&db, Day::Mon, "4051").await;

        let in_week = week.start_instant(local) + Duration::days(2);
        for (slot, group, due, by) in [
            (mine, "3011", in_week, author.id),
            (mine, "3011", in_week + Duration::WEEK, author.id),
            (theirs, "4051", in_week, author.id),
            (mine, "3011", in_week, other.id),
        ] {
            db.insert_assignment(&NewAssignment {
                schedule_id: slot,
                group_name: group.to_owned(),
                subject_text: "Mechanics".to_owned(),
                homework: "Read chapter 2".to_owned(),
                due_date: due,
                created_by: by,
            }).await.unwrap();
        }

        let wed = week.start + Duration::days(2);
        db.insert_event(&event("assembly", wed, None, None)).await.unwrap();
        db.insert_event(&event("lab", wed, Some(mine), None)).await.unwrap();
        db.insert_event(&event("their trip", wed, None, Some("4051"))).await.unwrap();
        db.insert_event(&event("next week", wed + Duration::WEEK, None, None)).await.unwrap();

        let dash = aggregate(&db, &student, &week, local).await.unwrap().unwrap();
        assert_eq!(dash.template(), "dashboard_student");
        match dash {
            Dashboard::Student(v) => {
                assert_eq!(v.schedule.len(), 2);
                assert!(v.schedule.iter().all(|s| s.group_name == "3011"));
                assert_eq!(v.assignments.len(), 2);
                assert!(v.assignments.iter().all(|a| a.group_name == "3011"));
                let titles: Vec<&str> = v.events.iter()
                    .map(|e| e.event.title.as_str()).collect();
                assert_eq!(titles.len(), 2);
                assert!(titles.contains(&"assembly"));
                assert!(titles.contains(&"lab"));
            },
            x => panic!("expected a student view, got {:?}", &x),
        }

        match aggregate(&db, &author, &week, local).await.unwrap().unwrap() {
            Dashboard::Teacher(v) => {
                assert_eq!(v.schedule.len(), 3);
                assert_eq!(v.groups, vec!["3011", "4051"]);
                assert_eq!(v.my_subject.as_deref(), Some("Physics"));
                assert_eq!(v.assignments.len(), 2);
                assert!(v.assignments.iter().all(|a| a.assignment.created_by == author.id));
                assert_eq!(v.events.len(), 3);
            },
            x => panic!("expected a teacher view, got {:?}", &x),
        }

        match aggregate(&db, &admin, &week, local).await.unwrap().unwrap() {
            Dashboard::Admin(v) => {
                assert_eq!(v.schedule.len(), 3);
                assert_eq!(v.events.len(), 3);
            },
            x => panic!("expected an admin view, got {:?}", &x),
        }
        db.nuke_database().await.unwrap();
    }

    #[tokio::test]
    #[serial]
    async fn student_without_slots_still_sees_events() {
        let db = fresh_store().await;

        let week = Week::containing(date!(2024-03-13), 0).unwrap();
        let student = add_user(&db, Role::Student, "anna", Some("1011")).await.identity();
        db.insert_event(&event("assembly", week.start, None, None)).await.unwrap();
        db.insert_event(&event("ours", week.end, None, Some("1011"))).await.unwrap();
        db.insert_event(&event("theirs", week.end, None, Some("3011"))).await.unwrap();

        match aggregate(&db, &student, &week, offset!(UTC)).await.unwrap().unwrap() {
            Dashboard::Student(v) => {
                assert!(v.schedule.is_empty());
                assert!(v.assignments.is_empty());
                assert_eq!(v.events.len(), 2);
            },
            x => panic!("expected a student view, got {:?}", &x),
        }
        db.nuke_database().await.unwrap();
    }
}
