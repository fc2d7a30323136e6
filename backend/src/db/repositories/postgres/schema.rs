// Hand-maintained to match migrations/. The PostGIS `geom` column of
// `site_polygons` is deliberately absent; geometry is read through raw SQL.

diesel::table! {
    projects (id) {
        id -> Int8,
        uuid -> Uuid,
        name -> Text,
        total_hectares_restored_goal -> Nullable<Float8>,
    }
}

diesel::table! {
    sites (id) {
        id -> Int8,
        uuid -> Uuid,
        project_uuid -> Uuid,
        name -> Text,
        start_date -> Nullable<Date>,
        hectares_to_restore_goal -> Nullable<Float8>,
    }
}

diesel::table! {
    site_polygons (id) {
        id -> Int8,
        uuid -> Uuid,
        site_uuid -> Uuid,
        poly_name -> Nullable<Text>,
        practice -> Nullable<Text>,
        target_sys -> Nullable<Text>,
        distr -> Nullable<Text>,
        num_trees -> Nullable<Int4>,
        plantstart -> Nullable<Date>,
        calc_area -> Nullable<Float8>,
        is_active -> Bool,
    }
}

diesel::table! {
    criteria_site (id) {
        id -> Int8,
        polygon_id -> Uuid,
        criteria_id -> Int4,
        valid -> Bool,
        extra_info -> Nullable<Jsonb>,
        created_at -> Timestamptz,
    }
}

diesel::table! {
    criteria_site_historic (id) {
        id -> Int8,
        polygon_id -> Uuid,
        criteria_id -> Int4,
        valid -> Bool,
        extra_info -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        archived_at -> Timestamptz,
    }
}

diesel::table! {
    delayed_jobs (id) {
        id -> Int8,
        uuid -> Uuid,
        name -> Text,
        status -> Text,
        status_code -> Nullable<Int4>,
        total_content -> Nullable<Int8>,
        processed_content -> Nullable<Int8>,
        progress_message -> Nullable<Text>,
        payload -> Nullable<Jsonb>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(
    projects,
    sites,
    site_polygons,
    criteria_site,
    criteria_site_historic,
    delayed_jobs,
);
