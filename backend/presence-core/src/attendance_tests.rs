// src/attendance_tests.rs

#[cfg(test)]
mod tests {
    use crate::attendance::*;
    use crate::models::{Employee, Scan};
    use crate::schedule::DaySlot;
    use chrono::{Duration, NaiveDate};

    const TOKEN: &str = "04A1B2C3";

    // 2025-03-03 is a Monday.
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    // Helper function to create an employee with one assignment on one weekday
    fn create_test_employee(slot: DaySlot, assignment: Option<&str>) -> Employee {
        let mut employee = Employee {
            name: Some("Test Employee".to_string()),
            nfc_token: TOKEN.to_string(),
            ..Default::default()
        };
        employee.schedule.set(slot, assignment);
        employee
    }

    // Tunis wall-clock scan, written with its explicit +01:00 offset
    fn scan_at(token: &str, date: &str, time: &str) -> Scan {
        Scan {
            id: None,
            nfc_token: token.to_string(),
            timestamp: format!("{}T{}:00+01:00", date, time),
        }
    }

    fn eval(employee: &Employee, scans: &[Scan], date: NaiveDate) -> StatusVerdict {
        evaluate(Some(employee), Some(scans), Some(date))
    }

    #[test]
    fn test_rest_marker_is_day_off_regardless_of_scans() {
        let employee = create_test_employee(DaySlot::Lundi, Some("Repos"));
        let scans = vec![scan_at(TOKEN, "2025-03-03", "07:30")];

        let verdict = eval(&employee, &scans, monday());
        assert_eq!(verdict.tag(), StatusTag::DayOff);
        assert_eq!(verdict.message(), "Repos");
        assert_eq!(verdict.color(), COLOR_DAYOFF);
        assert_eq!(verdict.schedule(), Some("Repos"));
        assert!(!verdict.is_valid());
    }

    #[test]
    fn test_empty_schedule_is_day_off() {
        let employee = create_test_employee(DaySlot::Lundi, None);
        let verdict = eval(&employee, &[scan_at(TOKEN, "2025-03-03", "07:30")], monday());
        assert_eq!(verdict, StatusVerdict::DayOff { schedule: None });

        let blank = create_test_employee(DaySlot::Lundi, Some(""));
        assert_eq!(eval(&blank, &[], monday()).tag(), StatusTag::DayOff);
    }

    #[test]
    fn test_unparseable_schedules_are_invalid() {
        for raw in ["0800-1600", "ab:00_16:00", "25:00_16:00", "08:75_16:00"] {
            let employee = create_test_employee(DaySlot::Lundi, Some(raw));
            let verdict = eval(&employee, &[], monday());
            assert_eq!(verdict.tag(), StatusTag::Invalid, "schedule {}", raw);
            assert_eq!(verdict.message(), "Horaire invalide");
            assert_eq!(verdict.color(), COLOR_NEUTRAL);
            assert_eq!(verdict.schedule(), Some(raw));
        }
    }

    #[test]
    fn test_window_bounds_are_inclusive() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));

        for time in ["06:00", "08:00"] {
            let verdict = eval(&employee, &[scan_at(TOKEN, "2025-03-03", time)], monday());
            assert_eq!(verdict.tag(), StatusTag::Present, "scan at {}", time);
            assert_eq!(verdict.scan_time().as_deref(), Some(time));
            assert_eq!(verdict.message(), "Présent");
            assert_eq!(verdict.color(), COLOR_PRESENT);
            assert!(verdict.is_valid());
        }
    }

    #[test]
    fn test_scans_just_outside_window_are_absent() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));

        for time in ["05:59", "08:01"] {
            let verdict = eval(&employee, &[scan_at(TOKEN, "2025-03-03", time)], monday());
            assert_eq!(verdict.tag(), StatusTag::Absent, "scan at {}", time);
            assert_eq!(verdict.message(), "Absent");
            assert_eq!(verdict.color(), COLOR_ABSENT);
            match verdict {
                StatusVerdict::Absent {
                    reason: AbsenceReason::OutOfWindow { last_scan },
                    ..
                } => assert_eq!(last_scan.format("%H:%M").to_string(), time),
                other => panic!("expected out-of-window absence, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_no_scan_is_absent_without_last_scan() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let someone_else = scan_at("FFFFFFFF", "2025-03-03", "07:30");

        let verdict = eval(&employee, &[someone_else], monday());
        assert!(matches!(
            verdict,
            StatusVerdict::Absent {
                reason: AbsenceReason::NoScan,
                ..
            }
        ));
        assert_eq!(verdict.view().last_scan_time, None);
    }

    #[test]
    fn test_in_window_scan_wins_over_out_of_window_scan() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let scans = vec![
            scan_at(TOKEN, "2025-03-03", "07:10"),
            scan_at(TOKEN, "2025-03-03", "17:45"),
        ];

        let verdict = eval(&employee, &scans, monday());
        assert_eq!(verdict.scan_time().as_deref(), Some("07:10"));
    }

    #[test]
    fn test_latest_in_window_scan_is_reported() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let scans = vec![
            scan_at(TOKEN, "2025-03-03", "07:40"),
            scan_at(TOKEN, "2025-03-03", "06:15"),
        ];

        let verdict = eval(&employee, &scans, monday());
        assert_eq!(verdict.scan_time().as_deref(), Some("07:40"));
    }

    #[test]
    fn test_missing_inputs_are_unknown() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let scans = vec![scan_at(TOKEN, "2025-03-03", "07:40")];

        let cases = [
            evaluate(None, Some(&scans), Some(monday())),
            evaluate(Some(&employee), None, Some(monday())),
            evaluate(Some(&employee), Some(&scans), None),
        ];
        for verdict in cases {
            assert_eq!(verdict.tag(), StatusTag::Unknown);
            assert_eq!(verdict.message(), "Inconnu");
            assert_eq!(verdict.color(), COLOR_NEUTRAL);
        }
    }

    #[test]
    fn test_out_of_range_weekday_is_unknown() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let verdict = AttendanceEvaluator::default().evaluate_weekday(&employee, &[], monday(), 7);
        assert_eq!(
            verdict,
            StatusVerdict::Unknown {
                reason: UnknownReason::InvalidWeekday
            }
        );
        assert_eq!(verdict.message(), "Jour invalide");
    }

    #[test]
    fn test_evaluate_is_idempotent() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let scans = vec![
            scan_at(TOKEN, "2025-03-03", "07:10"),
            scan_at(TOKEN, "2025-03-03", "09:00"),
        ];

        let first = eval(&employee, &scans, monday());
        let second = eval(&employee, &scans, monday());
        assert_eq!(first, second);
    }

    #[test]
    fn test_midnight_crossing_window_ignores_previous_day_scan() {
        // Tuesday shift starting at 00:30; window opens Monday 22:30.
        let employee = create_test_employee(DaySlot::Mardi, Some("00:30_08:30"));
        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let scans = vec![scan_at(TOKEN, "2025-03-03", "23:00")];

        let verdict = eval(&employee, &scans, tuesday);
        match verdict {
            StatusVerdict::Absent { reason, .. } => assert_eq!(reason, AbsenceReason::NoScan),
            other => panic!("expected absent, got {:?}", other),
        }
    }

    #[test]
    fn test_midnight_crossing_window_accepts_same_day_scan() {
        let employee = create_test_employee(DaySlot::Mardi, Some("00:30_08:30"));
        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let scans = vec![
            scan_at(TOKEN, "2025-03-03", "23:30"),
            scan_at(TOKEN, "2025-03-04", "00:10"),
        ];

        let verdict = eval(&employee, &scans, tuesday);
        assert_eq!(verdict.tag(), StatusTag::Present);
        assert_eq!(verdict.scan_time().as_deref(), Some("00:10"));
    }

    #[test]
    fn test_one_tap_does_not_count_for_two_days() {
        // 23:50 Monday with a 30 minute lookahead would reach a Tuesday 00:00 shift.
        let evaluator = AttendanceEvaluator::new(ValidationPolicy::symmetric(Duration::minutes(30)));
        let mut employee = create_test_employee(DaySlot::Lundi, Some("23:30_07:00"));
        employee.schedule.set(DaySlot::Mardi, Some("00:00_08:00"));
        let scans = vec![scan_at(TOKEN, "2025-03-03", "23:50")];

        let monday_verdict = evaluator.evaluate_day(&employee, &scans, monday());
        assert_eq!(monday_verdict.tag(), StatusTag::Present);

        let tuesday = NaiveDate::from_ymd_opt(2025, 3, 4).unwrap();
        let tuesday_verdict = evaluator.evaluate_day(&employee, &scans, tuesday);
        assert_eq!(tuesday_verdict.tag(), StatusTag::Absent);
    }

    #[test]
    fn test_utc_and_offset_less_timestamps_use_reference_zone() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let utc_scan = Scan {
            id: None,
            nfc_token: TOKEN.to_string(),
            // 07:00 in Tunis
            timestamp: "2025-03-03T06:00:00.000Z".to_string(),
        };
        let naive_scan = Scan {
            id: None,
            nfc_token: TOKEN.to_string(),
            timestamp: "2025-03-03T07:20:00".to_string(),
        };

        assert_eq!(
            eval(&employee, &[utc_scan], monday()).scan_time().as_deref(),
            Some("07:00")
        );
        assert_eq!(
            eval(&employee, &[naive_scan], monday()).scan_time().as_deref(),
            Some("07:20")
        );
    }

    #[test]
    fn test_unparseable_scan_timestamp_is_skipped() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let garbage = Scan {
            id: None,
            nfc_token: TOKEN.to_string(),
            timestamp: "not a time".to_string(),
        };
        let verdict = eval(&employee, &[garbage, scan_at(TOKEN, "2025-03-03", "07:00")], monday());
        assert_eq!(verdict.scan_time().as_deref(), Some("07:00"));
    }

    #[test]
    fn test_symmetric_policy_accepts_late_arrivals() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let evaluator = AttendanceEvaluator::new(ValidationPolicy::symmetric(Duration::minutes(30)));

        let late = evaluator.evaluate_day(&employee, &[scan_at(TOKEN, "2025-03-03", "08:25")], monday());
        assert_eq!(late.tag(), StatusTag::Present);

        let early = evaluator.evaluate_day(&employee, &[scan_at(TOKEN, "2025-03-03", "07:20")], monday());
        assert_eq!(early.tag(), StatusTag::Absent);
    }

    #[test]
    fn test_policy_from_minutes_clamps_negative_values() {
        let policy = ValidationPolicy::from_minutes(-5, 15);
        assert_eq!(policy.lookback, Duration::zero());
        assert_eq!(policy.lookahead, Duration::minutes(15));
    }

    #[test]
    fn test_verdict_serializes_flat_view() {
        let employee = create_test_employee(DaySlot::Lundi, Some("08:00_16:00"));
        let verdict = eval(&employee, &[scan_at(TOKEN, "2025-03-03", "07:45")], monday());

        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["status"], "present");
        assert_eq!(json["isValid"], true);
        assert_eq!(json["scanTime"], "07:45");
        assert_eq!(json["schedule"], "08:00_16:00");
        assert_eq!(json["window"], "Fenêtre: 06:00 - 08:00");

        let day_off = eval(&create_test_employee(DaySlot::Lundi, Some("Repos")), &[], monday());
        assert_eq!(serde_json::to_value(&day_off).unwrap()["status"], "dayoff");
    }

    #[test]
    fn test_reference_date_of_late_utc_instant_is_next_local_day() {
        let evaluator = AttendanceEvaluator::default();
        let instant = chrono::DateTime::parse_from_rfc3339("2025-03-02T23:30:00Z")
            .unwrap()
            .with_timezone(&chrono::Utc);
        assert_eq!(evaluator.reference_date_of(instant), monday());
    }
}
