use fetchmoodle_lib::{CourseId, ParseIdError, Resource};

#[test]
fn course_url() {
    let course = CourseId::parse("https://school.example/course/view.php?id=42").unwrap();
    assert_eq!(course.get(), 42);

    let course = CourseId::parse("https://school.example/moodle/course/view.php?section=2&id=7#top")
        .unwrap();
    assert_eq!(course, CourseId::new(7));
}

#[test]
fn course_url_from_str_trims() {
    let course: CourseId = "  https://school.example/course/view.php?id=3\n".parse().unwrap();
    assert_eq!(course.id(), 3);
}

#[test]
fn course_url_round_trip() {
    let url = CourseId::new(12).url("https://school.example/");
    assert_eq!(url, "https://school.example/course/view.php?id=12");
    assert_eq!(CourseId::parse(&url).unwrap().get(), 12);
}

#[test]
fn not_a_url() {
    assert!(matches!(
        CourseId::parse("course 12"),
        Err(ParseIdError::InvalidUrl { kind: "course", .. })
    ));
}

#[test]
fn wrong_page() {
    match CourseId::parse("https://school.example/mod/quiz/view.php?id=12") {
        Err(ParseIdError::WrongPath { path, .. }) => assert_eq!(path, "/mod/quiz/view.php"),
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn missing_or_invalid_id() {
    for url in [
        "https://school.example/course/view.php",
        "https://school.example/course/view.php?id=",
        "https://school.example/course/view.php?id=abc",
        "https://school.example/course/view.php?id=0",
        "https://school.example/course/view.php?id=-4",
    ] {
        assert!(
            matches!(
                CourseId::parse(url),
                Err(ParseIdError::MissingId { param: "id", .. })
            ),
            "{url} should have no valid id"
        );
    }
}
