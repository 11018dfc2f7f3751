// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! End-to-end behaviour of the directory store against migrated databases.

use orgdir_config::DatabaseConfig;
use orgdir_db::testing::{
	create_directory_test_pool, delete_test_user, insert_test_user, prepare_directory,
};
use orgdir_db::{create_pool, Directory, SqlitePool};
use orgdir_model::{
	ChangeContext, CourseLinkUpdate, HistoryType, InstitutionUpdate, NewCourseLink,
	NewInstitution, NewOrganization, OrganizationFilter, OrganizationUpdate,
};
use proptest::prelude::*;
use tempfile::TempDir;

async fn file_backed_pool(dir: &TempDir) -> SqlitePool {
	let config = DatabaseConfig {
		url: format!("sqlite:{}", dir.path().join("orgdir.db").display()),
		max_connections: 4,
		busy_timeout_secs: 10,
	};
	let pool = create_pool(&config).await.unwrap();
	prepare_directory(&pool).await;
	pool
}

#[tokio::test]
async fn concurrent_creates_with_same_short_name_admit_one() {
	let dir = TempDir::new().unwrap();
	let directory = Directory::new(file_backed_pool(&dir).await);
	let first = directory.organizations.clone();
	let second = directory.organizations.clone();

	let (a, b) = tokio::join!(
		tokio::spawn(async move {
			first
				.create(&NewOrganization::new("First", "race"), &ChangeContext::system())
				.await
		}),
		tokio::spawn(async move {
			second
				.create(&NewOrganization::new("Second", "race"), &ChangeContext::system())
				.await
		}),
	);
	let results = [a.unwrap(), b.unwrap()];

	let successes = results.iter().filter(|r| r.is_ok()).count();
	assert_eq!(successes, 1);
	let failure = results.iter().find_map(|r| r.as_ref().err()).unwrap();
	assert!(failure.is_uniqueness(), "unexpected error: {failure}");

	let stored = directory
		.organizations
		.list(&OrganizationFilter {
			search: Some("race".to_string()),
			..Default::default()
		})
		.await
		.unwrap();
	assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn concurrent_course_links_for_same_pair_admit_one() {
	let dir = TempDir::new().unwrap();
	let directory = Directory::new(file_backed_pool(&dir).await);
	let org = directory
		.organizations
		.create(&NewOrganization::new("Org", "org"), &ChangeContext::system())
		.await
		.unwrap();
	let org_id = org.id;

	let handles: Vec<_> = (0..4)
		.map(|_| {
			let courses = directory.courses.clone();
			tokio::spawn(async move {
				courses
					.link(&NewCourseLink::new(org_id, "course-v1:Org+X+1"), &ChangeContext::system())
					.await
			})
		})
		.collect();

	let mut successes = 0;
	for handle in handles {
		match handle.await.unwrap() {
			Ok(_) => successes += 1,
			Err(e) => assert!(e.is_uniqueness(), "unexpected error: {e}"),
		}
	}
	assert_eq!(successes, 1);
}

const RACE_ROUNDS: usize = 25;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_update_keeps_organization_deactivation() {
	let dir = TempDir::new().unwrap();
	let directory = Directory::new(file_backed_pool(&dir).await);

	for round in 0..RACE_ROUNDS {
		let org = directory
			.organizations
			.create(
				&NewOrganization::new("Org", format!("org-{round}")),
				&ChangeContext::system(),
			)
			.await
			.unwrap();
		let id = org.id;
		let updater = directory.organizations.clone();
		let deactivator = directory.organizations.clone();
		let renamed = format!("Renamed {round}");
		let name = renamed.clone();

		let (updated, deactivated) = tokio::join!(
			tokio::spawn(async move {
				updater
					.update(
						id,
						OrganizationUpdate {
							name: Some(name),
							..Default::default()
						},
						&ChangeContext::system(),
					)
					.await
			}),
			tokio::spawn(async move { deactivator.deactivate(id, &ChangeContext::system()).await }),
		);
		updated.unwrap().unwrap();
		deactivated.unwrap().unwrap();

		let stored = directory.organizations.get(org.id).await.unwrap().unwrap();
		assert!(!stored.active, "round {round}: deactivation lost");
		assert_eq!(stored.name, renamed, "round {round}: rename lost");
		assert_eq!(directory.organizations.history_for(org.id).count().await.unwrap(), 3);
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_update_keeps_institution_deactivation() {
	let dir = TempDir::new().unwrap();
	let directory = Directory::new(file_backed_pool(&dir).await);

	for round in 0..RACE_ROUNDS {
		let inst = directory
			.institutions
			.create(
				&NewInstitution::new("School", format!("school-{round}")),
				&ChangeContext::system(),
			)
			.await
			.unwrap();
		let id = inst.id;
		let updater = directory.institutions.clone();
		let deactivator = directory.institutions.clone();

		let (updated, deactivated) = tokio::join!(
			tokio::spawn(async move {
				updater
					.update(
						id,
						InstitutionUpdate {
							city: Some(Some("Boston".to_string())),
							..Default::default()
						},
						&ChangeContext::system(),
					)
					.await
			}),
			tokio::spawn(async move { deactivator.deactivate(id, &ChangeContext::system()).await }),
		);
		updated.unwrap().unwrap();
		deactivated.unwrap().unwrap();

		let stored = directory.institutions.get(inst.id).await.unwrap().unwrap();
		assert!(!stored.active, "round {round}: deactivation lost");
		assert_eq!(stored.city.as_deref(), Some("Boston"), "round {round}: city lost");
	}
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_update_keeps_course_link_deactivation() {
	let dir = TempDir::new().unwrap();
	let directory = Directory::new(file_backed_pool(&dir).await);
	let org = directory
		.organizations
		.create(&NewOrganization::new("Org", "org"), &ChangeContext::system())
		.await
		.unwrap();

	for round in 0..RACE_ROUNDS {
		let link = directory
			.courses
			.link(
				&NewCourseLink::new(org.id, format!("course-v1:Org+C{round}+1")),
				&ChangeContext::system(),
			)
			.await
			.unwrap();
		let id = link.id;
		let updater = directory.courses.clone();
		let deactivator = directory.courses.clone();
		let rekeyed = format!("course-v1:Org+C{round}+2");
		let course_id = rekeyed.clone();

		let (updated, deactivated) = tokio::join!(
			tokio::spawn(async move {
				updater
					.update(
						id,
						CourseLinkUpdate {
							course_id: Some(course_id),
							active: None,
						},
						&ChangeContext::system(),
					)
					.await
			}),
			tokio::spawn(async move { deactivator.deactivate(id, &ChangeContext::system()).await }),
		);
		updated.unwrap().unwrap();
		deactivated.unwrap().unwrap();

		let stored = directory.courses.get(link.id).await.unwrap().unwrap();
		assert!(!stored.active, "round {round}: deactivation lost");
		assert_eq!(stored.course_id, rekeyed, "round {round}: course key lost");
	}
}

#[tokio::test]
async fn deleting_acting_user_nulls_history_user() {
	let pool = create_directory_test_pool().await;
	let directory = Directory::new(pool.clone());
	let staff = insert_test_user(&pool, "staff").await;
	let ctx = ChangeContext::by(staff).with_reason("initial import");

	let org = directory
		.organizations
		.create(&NewOrganization::new("Org", "org"), &ctx)
		.await
		.unwrap();
	let inst = directory
		.institutions
		.create(&NewInstitution::new("School", "school"), &ctx)
		.await
		.unwrap();

	delete_test_user(&pool, staff).await;

	let org_history = directory.organizations.latest_history(org.id).await.unwrap().unwrap();
	assert_eq!(org_history.history_user, None);
	assert_eq!(org_history.history_change_reason.as_deref(), Some("initial import"));
	assert_eq!(org_history.snapshot, org);

	let inst_history = directory.institutions.latest_history(inst.id).await.unwrap().unwrap();
	assert_eq!(inst_history.history_user, None);
	assert_eq!(inst_history.history_type, HistoryType::Created);

	// The entities themselves are untouched.
	assert!(directory.organizations.get(org.id).await.unwrap().is_some());
}

#[tokio::test]
async fn create_update_deactivate_history_is_newest_first() {
	let directory = Directory::new(create_directory_test_pool().await);
	let ctx = ChangeContext::system();
	let org = directory
		.organizations
		.create(&NewOrganization::new("Org", "org"), &ctx)
		.await
		.unwrap();
	directory
		.organizations
		.update(
			org.id,
			OrganizationUpdate {
				description: Some(Some("About".to_string())),
				..Default::default()
			},
			&ctx,
		)
		.await
		.unwrap();
	directory.organizations.deactivate(org.id, &ctx).await.unwrap();

	let history = directory.organizations.history_for(org.id).collect().await.unwrap();
	assert_eq!(
		history.iter().map(|h| h.history_type).collect::<Vec<_>>(),
		vec![HistoryType::Changed, HistoryType::Changed, HistoryType::Created]
	);
	let ids: Vec<i64> = history.iter().map(|h| h.history_id.into_inner()).collect();
	assert!(ids.windows(2).all(|w| w[0] > w[1]));
	assert!(history
		.windows(2)
		.all(|w| w[0].history_date >= w[1].history_date));
}

fn runtime() -> tokio::runtime::Runtime {
	tokio::runtime::Builder::new_current_thread()
		.enable_all()
		.build()
		.unwrap()
}

proptest! {
	#![proptest_config(ProptestConfig::with_cases(24))]

	#[test]
	fn invalid_short_names_are_never_persisted(short_name in "[a-z]{0,4}[ !@#$%^&*(){}/]{1,3}[a-z]{0,4}") {
		let rt = runtime();
		rt.block_on(async {
			let directory = Directory::new(create_directory_test_pool().await);
			let err = directory
				.organizations
				.create(&NewOrganization::new("Org", short_name.clone()), &ChangeContext::system())
				.await
				.unwrap_err();
			assert!(err.is_validation());
			let err = directory
				.institutions
				.create(&NewInstitution::new("School", short_name.clone()), &ChangeContext::system())
				.await
				.unwrap_err();
			assert!(err.is_validation());
			assert!(directory
				.organizations
				.list(&OrganizationFilter::default())
				.await
				.unwrap()
				.is_empty());
		});
	}

	#[test]
	fn created_fields_read_back(
		name in "[A-Za-z][A-Za-z ]{0,30}",
		short_name in "[A-Za-z0-9._-]{1,20}",
		description in proptest::option::of("[ -~]{0,60}"),
	) {
		let rt = runtime();
		rt.block_on(async {
			let directory = Directory::new(create_directory_test_pool().await);
			let mut new = NewOrganization::new(name.clone(), short_name.clone());
			new.description = description.clone();

			let created = directory
				.organizations
				.create(&new, &ChangeContext::system())
				.await
				.unwrap();
			let read = directory.organizations.get(created.id).await.unwrap().unwrap();

			assert_eq!(read.name, name);
			assert_eq!(read.short_name, short_name);
			assert_eq!(read.description, description);
			assert!(read.active);
		});
	}
}
