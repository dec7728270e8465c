// src/grid_tests.rs

#[cfg(test)]
mod tests {
    use crate::attendance::{AttendanceEvaluator, StatusTag, COLOR_ABSENT, COLOR_DAYOFF, COLOR_PRESENT};
    use crate::calendar::WeekId;
    use crate::grid::*;
    use crate::models::{Employee, Scan};
    use crate::schedule::DaySlot;
    use crate::session::Scope;
    use chrono::NaiveDate;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 3).unwrap()
    }

    // Helper: employee working 08:00_16:00 Monday to Friday, resting on weekends
    fn create_test_employee(matricule: &str, name: &str, segment: &str, token: &str) -> Employee {
        let mut employee = Employee {
            matricule: Some(matricule.to_string()),
            name: Some(name.to_string()),
            segment: Some(segment.to_string()),
            nfc_token: token.to_string(),
            ..Default::default()
        };
        for slot in DaySlot::ALL {
            let value = match slot {
                DaySlot::Samedi | DaySlot::Dimanche => "Repos",
                _ => "08:00_16:00",
            };
            employee.schedule.set(slot, Some(value));
        }
        employee
    }

    fn scan(token: &str, timestamp: &str) -> Scan {
        Scan {
            id: None,
            nfc_token: token.to_string(),
            timestamp: timestamp.to_string(),
        }
    }

    fn fixture() -> (Vec<Employee>, Vec<Scan>) {
        let mut night = create_test_employee("1003", "Sami Trabelsi", "Logistique", "TOKEN-C");
        night.schedule.set(DaySlot::Lundi, Some("22:00_06:00"));

        let employees = vec![
            create_test_employee("1001", "Amira Ben Salah", "Assemblage", "TOKEN-A"),
            create_test_employee("1002", "Youssef Gharbi", "Assemblage", "TOKEN-B"),
            night,
        ];
        let scans = vec![
            scan("TOKEN-A", "2025-03-03T07:35:00+01:00"),
            scan("TOKEN-A", "2025-03-04T07:50:00+01:00"),
            scan("TOKEN-B", "2025-03-03T09:10:00+01:00"),
        ];
        (employees, scans)
    }

    fn no_filter() -> GridFilter {
        GridFilter::default()
    }

    #[test]
    fn test_day_grid_labels_and_badges() {
        let (employees, scans) = fixture();
        let grid = day_grid(
            &AttendanceEvaluator::default(),
            &employees,
            &scans,
            monday(),
            &no_filter(),
            &Scope::AllEmployees,
        );

        assert_eq!(grid.view, ViewMode::Day);
        assert_eq!(grid.title, "Jour 03/03/2025 (Lundi)");
        assert_eq!(grid.columns, vec!["Lundi 03/03"]);
        assert_eq!(grid.rows.len(), 3);

        let present = &grid.rows[0].cells[0];
        assert_eq!(present.label, "PRÉSENT");
        assert_eq!(present.badge, "✓");
        assert_eq!(present.color, COLOR_PRESENT);
        assert_eq!(present.scan_time(), Some("07:35"));
        assert_eq!(present.schedule, "08:00_16:00");

        let late = &grid.rows[1].cells[0];
        assert_eq!(late.label, "ABSENT");
        assert_eq!(late.badge, "✗");
        assert_eq!(late.color, COLOR_ABSENT);
        assert_eq!(late.verdict.last_scan_time.as_deref(), Some("09:10"));

        assert_eq!(grid.totals.present, 1);
        assert_eq!(grid.totals.absent, 2);
    }

    #[test]
    fn test_day_grid_rest_day_cell() {
        let (employees, scans) = fixture();
        let sunday = NaiveDate::from_ymd_opt(2025, 3, 2).unwrap();
        let grid = day_grid(
            &AttendanceEvaluator::default(),
            &employees,
            &scans,
            sunday,
            &no_filter(),
            &Scope::AllEmployees,
        );

        let cell = &grid.rows[0].cells[0];
        assert_eq!(cell.label, "REPOS");
        assert_eq!(cell.color, COLOR_DAYOFF);
        assert_eq!(cell.text_color, "#000000");
        assert_eq!(grid.totals.dayoff, 3);
    }

    #[test]
    fn test_missing_schedule_shows_not_available() {
        let mut employee = create_test_employee("1004", "Nour", "Assemblage", "TOKEN-D");
        employee.schedule.set(DaySlot::Lundi, None);
        let grid = day_grid(
            &AttendanceEvaluator::default(),
            &[employee],
            &[],
            monday(),
            &no_filter(),
            &Scope::AllEmployees,
        );
        assert_eq!(grid.rows[0].cells[0].schedule, "N/A");
        assert_eq!(grid.rows[0].cells[0].label, "REPOS");
    }

    #[test]
    fn test_week_grid_has_seven_cells_monday_first() {
        let (employees, scans) = fixture();
        let week: WeekId = "2025-W10".parse().unwrap();
        let grid = week_grid(
            &AttendanceEvaluator::default(),
            &employees,
            &scans,
            week,
            monday(),
            &no_filter(),
            &Scope::AllEmployees,
        );

        assert_eq!(grid.title, "Semaine 2025-10");
        assert_eq!(grid.dates.len(), 7);
        assert_eq!(grid.dates[0], monday());
        assert_eq!(grid.columns[6], "Dimanche 09/03");

        let amira = &grid.rows[0];
        assert_eq!(amira.cells.len(), 7);
        assert_eq!(amira.cells[0].label, "Présent");
        assert_eq!(amira.cells[1].verdict.status, StatusTag::Present);
        assert_eq!(amira.cells[2].label, "Absent");
        assert_eq!(amira.cells[5].label, "REPOS");
        assert_eq!(amira.cells[6].label, "REPOS");
        assert_eq!(grid.totals.total(), 21);
    }

    #[test]
    fn test_day_and_week_views_agree() {
        let (employees, scans) = fixture();
        let evaluator = AttendanceEvaluator::default();
        let week = WeekId::containing(monday());
        let week_view = week_grid(
            &evaluator,
            &employees,
            &scans,
            week,
            monday(),
            &no_filter(),
            &Scope::AllEmployees,
        );

        for (offset, date) in week.dates().iter().enumerate() {
            let day_view = day_grid(
                &evaluator,
                &employees,
                &scans,
                *date,
                &no_filter(),
                &Scope::AllEmployees,
            );
            for (day_row, week_row) in day_view.rows.iter().zip(&week_view.rows) {
                assert_eq!(day_row.cells[0].verdict, week_row.cells[offset].verdict);
            }
        }
    }

    #[test]
    fn test_search_filter_is_case_insensitive_over_fields() {
        let (employees, scans) = fixture();
        let filter = GridFilter {
            search: Some("gharbi".to_string()),
            ..Default::default()
        };
        let grid = day_grid(
            &AttendanceEvaluator::default(),
            &employees,
            &scans,
            monday(),
            &filter,
            &Scope::AllEmployees,
        );
        assert_eq!(grid.rows.len(), 1);
        assert_eq!(grid.rows[0].employee.matricule.as_deref(), Some("1002"));

        let by_token = GridFilter {
            search: Some("token-c".to_string()),
            ..Default::default()
        };
        assert!(by_token.matches(&employees[2], monday()));
        assert!(!by_token.matches(&employees[0], monday()));
    }

    #[test]
    fn test_shift_filter_uses_reference_day_assignment() {
        let (employees, _) = fixture();
        let night = GridFilter {
            shift: Some("22:00_06:00".to_string()),
            ..Default::default()
        };
        let on_monday: Vec<_> = employees.iter().filter(|e| night.matches(e, monday())).collect();
        assert_eq!(on_monday.len(), 1);
        assert_eq!(on_monday[0].nfc_token, "TOKEN-C");

        let rest = GridFilter {
            shift: Some("Repos".to_string()),
            ..Default::default()
        };
        let saturday = NaiveDate::from_ymd_opt(2025, 3, 8).unwrap();
        assert!(employees.iter().all(|e| rest.matches(e, saturday)));
        assert!(employees.iter().all(|e| !rest.matches(e, monday())));
    }

    #[test]
    fn test_filters_combine_and_all_disables() {
        let (employees, _) = fixture();
        let filter = GridFilter {
            search: Some("a".to_string()),
            shift: Some("all".to_string()),
            segment: Some("Logistique".to_string()),
        };
        let kept: Vec<_> = employees.iter().filter(|e| filter.matches(e, monday())).collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].segment.as_deref(), Some("Logistique"));

        assert!(filter.clone().without_segment().matches(&employees[0], monday()));
    }

    #[test]
    fn test_scope_limits_rows() {
        let (employees, scans) = fixture();
        let evaluator = AttendanceEvaluator::default();

        let segment = day_grid(
            &evaluator,
            &employees,
            &scans,
            monday(),
            &no_filter(),
            &Scope::Segment("Assemblage".to_string()),
        );
        assert_eq!(segment.rows.len(), 2);

        let nothing = day_grid(&evaluator, &employees, &scans, monday(), &no_filter(), &Scope::Nothing);
        assert!(nothing.rows.is_empty());
        assert_eq!(nothing.totals.total(), 0);
    }

    #[test]
    fn test_grid_serializes_camel_case() {
        let (employees, scans) = fixture();
        let grid = day_grid(
            &AttendanceEvaluator::default(),
            &employees[..1],
            &scans,
            monday(),
            &no_filter(),
            &Scope::AllEmployees,
        );
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json["view"], "day");
        assert_eq!(json["dates"][0], "2025-03-03");
        assert_eq!(json["rows"][0]["employee"]["nfcToken"], "TOKEN-A");
        assert_eq!(json["rows"][0]["cells"][0]["textColor"], "#FFFFFF");
        assert_eq!(json["rows"][0]["cells"][0]["verdict"]["scanTime"], "07:35");
    }
}
